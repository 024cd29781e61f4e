//! Workflow definition JSON — the immutable campaign graph.
//!
//! Deserialized once per campaign from the stored JSONB definition.
//! Placeholder `addStep` nodes exist only for the visual editor and are
//! filtered out of every traversal.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Node / step kinds
// ---------------------------------------------------------------------------

/// Action kinds a workflow node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ProfileVisit,
    SendConnectionRequest,
    SendFollowup,
    LikePost,
    CommentPost,
    WithdrawRequest,
    Webhook,
    SendInmail,
}

/// Step kinds in the ledger: every node kind plus the two internal
/// polling kinds that observe asynchronous outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ProfileVisit,
    SendConnectionRequest,
    SendFollowup,
    LikePost,
    CommentPost,
    WithdrawRequest,
    Webhook,
    SendInmail,
    CheckConnectionStatus,
    CheckMessageReply,
}

impl StepKind {
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::CheckConnectionStatus | Self::CheckMessageReply)
    }
}

impl From<NodeKind> for StepKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::ProfileVisit => Self::ProfileVisit,
            NodeKind::SendConnectionRequest => Self::SendConnectionRequest,
            NodeKind::SendFollowup => Self::SendFollowup,
            NodeKind::LikePost => Self::LikePost,
            NodeKind::CommentPost => Self::CommentPost,
            NodeKind::WithdrawRequest => Self::WithdrawRequest,
            NodeKind::Webhook => Self::Webhook,
            NodeKind::SendInmail => Self::SendInmail,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ProfileVisit => "profile_visit",
            Self::SendConnectionRequest => "send_connection_request",
            Self::SendFollowup => "send_followup",
            Self::LikePost => "like_post",
            Self::CommentPost => "comment_post",
            Self::WithdrawRequest => "withdraw_request",
            Self::Webhook => "webhook",
            Self::SendInmail => "send_inmail",
            Self::CheckConnectionStatus => "check_connection_status",
            Self::CheckMessageReply => "check_message_reply",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for StepKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile_visit" => Ok(Self::ProfileVisit),
            "send_connection_request" => Ok(Self::SendConnectionRequest),
            "send_followup" => Ok(Self::SendFollowup),
            "like_post" => Ok(Self::LikePost),
            "comment_post" => Ok(Self::CommentPost),
            "withdraw_request" => Ok(Self::WithdrawRequest),
            "webhook" => Ok(Self::Webhook),
            "send_inmail" => Ok(Self::SendInmail),
            "check_connection_status" => Ok(Self::CheckConnectionStatus),
            "check_message_reply" => Ok(Self::CheckMessageReply),
            other => Err(format!("unknown step type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Outer node categories as the editor writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "action")]
    #[default]
    Action,
    #[serde(rename = "addStep")]
    AddStep,
    #[serde(other)]
    Other,
}

/// Per-kind configuration knobs. All optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(rename = "useAI")]
    pub use_ai: bool,
    #[serde(rename = "customMessage")]
    pub custom_message: Option<String>,
    #[serde(rename = "configureWithAI")]
    pub configure_with_ai: bool,
    #[serde(rename = "customComment")]
    pub custom_comment: Option<String>,
    #[serde(rename = "lastDays")]
    pub last_days: Option<u32>,
    #[serde(rename = "reactionType")]
    pub reaction_type: Option<String>,
}

/// `data` payload of a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// The action kind; `None` for placeholder or unrecognised kinds.
    #[serde(rename = "type", default, deserialize_with = "lenient_node_kind")]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub config: NodeConfig,
}

/// Unknown kinds deserialize to `None` instead of failing the whole
/// definition; the graph layer filters those nodes out.
fn lenient_node_kind<'de, D>(de: D) -> Result<Option<NodeKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(de)?;
    Ok(serde_json::from_value(value).ok())
}

/// A workflow node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: NodeData,
}

impl WorkflowNode {
    /// Placeholder nodes never execute and never count for edges.
    pub fn is_placeholder(&self) -> bool {
        self.node_type == NodeType::AddStep || self.data.kind.is_none()
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Raw delay payload; `delay` is a stringified integer on the wire.
/// Malformed amounts or unknown units resolve to zero delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayData {
    pub delay: String,
    pub unit: String,
}

/// `data` payload of an edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeData {
    #[serde(rename = "isConditionalPath")]
    pub is_conditional_path: Option<bool>,
    #[serde(rename = "isPositive")]
    pub is_positive: Option<bool>,
    #[serde(rename = "delayData")]
    pub delay_data: Option<DelayData>,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub data: EdgeData,
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// The immutable campaign graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

impl WorkflowDefinition {
    /// Parse a stored JSONB definition.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Executable nodes, placeholders removed, in definition order.
    pub fn retained_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.iter().filter(|n| !n.is_placeholder())
    }

    /// Look up a retained node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.retained_nodes().find(|n| n.id == id)
    }

    /// Edges whose both endpoints are retained nodes.
    pub fn retained_edges(&self) -> impl Iterator<Item = &WorkflowEdge> {
        self.edges
            .iter()
            .filter(|e| self.node(&e.source).is_some() && self.node(&e.target).is_some())
    }
}
