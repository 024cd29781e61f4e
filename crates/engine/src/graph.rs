//! Graph navigator — entry-node resolution and outgoing-edge analysis.
//!
//! Pure functions over a [`WorkflowDefinition`]. Placeholder nodes and
//! edges touching them are invisible here (see
//! [`WorkflowDefinition::retained_nodes`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::workflow::{WorkflowDefinition, WorkflowNode};

/// Which asynchronous outcome a conditional edge is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOutcome {
    Accepted,
    NotAccepted,
}

/// One outgoing edge, resolved into the planner's vocabulary.
///
/// Serialized (camelCase) into polling steps' `raw_response` so a polling
/// completion never has to re-read the workflow definition to pick a
/// branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub node_id: String,
    pub edge_id: String,
    pub delay_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_type: Option<BranchOutcome>,
}

/// Resolve the node each lead starts from.
///
/// The entry is the first retained node with no incoming retained edge;
/// if every node has incoming edges (a cycle), the first node wins.
pub fn entry_node(def: &WorkflowDefinition) -> Option<&WorkflowNode> {
    let mut in_degree: HashMap<&str, usize> =
        def.retained_nodes().map(|n| (n.id.as_str(), 0)).collect();
    for edge in def.retained_edges() {
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }
    def.retained_nodes()
        .find(|n| in_degree.get(n.id.as_str()) == Some(&0))
        .or_else(|| def.retained_nodes().next())
}

/// All outgoing edges of `node_id`, with delay and branch classification.
pub fn outgoing(def: &WorkflowDefinition, node_id: &str) -> Vec<NextStep> {
    def.retained_edges()
        .filter(|e| e.source == node_id)
        .map(|e| {
            let delay_ms = e.data.delay_data.as_ref().map(clock::delay_to_ms).unwrap_or(0);
            let conditional_type = (e.data.is_conditional_path == Some(true)).then(|| {
                if e.data.is_positive == Some(true) {
                    BranchOutcome::Accepted
                } else {
                    BranchOutcome::NotAccepted
                }
            });
            NextStep {
                node_id: e.target.clone(),
                edge_id: e.id.clone(),
                delay_ms,
                conditional_type,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linear_with_branches() -> WorkflowDefinition {
        WorkflowDefinition::from_value(json!({
            "nodes": [
                {"id": "invite", "type": "action", "data": {"type": "send_connection_request"}},
                {"id": "followup", "type": "action", "data": {"type": "send_followup"}},
                {"id": "withdraw", "type": "action", "data": {"type": "withdraw_request"}},
                {"id": "ghost", "type": "addStep", "data": {}}
            ],
            "edges": [
                {"id": "e-yes", "source": "invite", "target": "followup",
                 "data": {"isConditionalPath": true, "isPositive": true,
                          "delayData": {"delay": "2", "unit": "d"}}},
                {"id": "e-no", "source": "invite", "target": "withdraw",
                 "data": {"isConditionalPath": true, "isPositive": false,
                          "delayData": {"delay": "2", "unit": "d"}}},
                {"id": "e-ghost", "source": "invite", "target": "ghost"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn entry_is_the_zero_in_degree_node() {
        let def = linear_with_branches();
        assert_eq!(entry_node(&def).unwrap().id, "invite");
    }

    #[test]
    fn entry_falls_back_to_first_node_in_a_cycle() {
        let def = WorkflowDefinition::from_value(json!({
            "nodes": [
                {"id": "a", "type": "action", "data": {"type": "profile_visit"}},
                {"id": "b", "type": "action", "data": {"type": "like_post"}}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b"},
                {"id": "e2", "source": "b", "target": "a"}
            ]
        }))
        .unwrap();
        assert_eq!(entry_node(&def).unwrap().id, "a");
    }

    #[test]
    fn outgoing_classifies_branches_and_delays() {
        let def = linear_with_branches();
        let next = outgoing(&def, "invite");
        // The edge to the placeholder is dropped.
        assert_eq!(next.len(), 2);

        let yes = next.iter().find(|n| n.node_id == "followup").unwrap();
        assert_eq!(yes.conditional_type, Some(BranchOutcome::Accepted));
        assert_eq!(yes.delay_ms, 2 * 86_400_000);

        let no = next.iter().find(|n| n.node_id == "withdraw").unwrap();
        assert_eq!(no.conditional_type, Some(BranchOutcome::NotAccepted));
    }

    #[test]
    fn next_step_round_trips_camel_case() {
        let step = NextStep {
            node_id: "followup".into(),
            edge_id: "e-yes".into(),
            delay_ms: 1000,
            conditional_type: Some(BranchOutcome::Accepted),
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["nodeId"], "followup");
        assert_eq!(value["conditionalType"], "accepted");
        let back: NextStep = serde_json::from_value(value).unwrap();
        assert_eq!(back, step);
    }
}
