//! Core domain entities for the campaign engine.
//!
//! These types are the in-memory source of truth for campaigns, leads,
//! sender accounts, and the scheduler's step ledger. Persistence row
//! structs live in the `db` crate and convert into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{StepKind, WorkflowDefinition};

/// Every step the engine schedules belongs to this workflow family.
pub const CAMPAIGN_WORKFLOW: &str = "campaign_workflow";

// ---------------------------------------------------------------------------
// Campaign
// ---------------------------------------------------------------------------

/// Campaign lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    InProgress,
    Paused,
    Completed,
    Failed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown campaign status: {other}")),
        }
    }
}

/// An outreach campaign: one sender account, one prospect list, one
/// immutable workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub connected_account_id: Uuid,
    /// Reference into the prospect-list source (resolved externally).
    pub prospect_list_id: Option<String>,
    pub name: String,
    /// Write-once workflow graph, created alongside the campaign.
    pub workflow: WorkflowDefinition,
    pub status: CampaignStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub leads_per_day: i32,
    pub requests_sent_this_day: i32,
    pub requests_sent_this_week: i32,
    pub last_daily_requests_reset: Option<DateTime<Utc>>,
    pub last_weekly_requests_reset: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default daily lead admission when a campaign doesn't set one.
pub const DEFAULT_LEADS_PER_DAY: i32 = 10;

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// A prospect imported into exactly one campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub campaign_id: Uuid,
    pub linkedin_url: String,
    pub public_identifier: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    /// Provider-internal member id, filled in after the first profile visit.
    pub provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// The identifier used for provider calls: the stored public
    /// identifier, or the slug derived from the profile URL.
    pub fn identifier(&self) -> Option<String> {
        self.public_identifier
            .clone()
            .or_else(|| public_identifier_from_url(&self.linkedin_url))
    }

    /// Merge enriched attributes; `None` fields keep their value.
    pub fn apply_enrichment(&mut self, e: &LeadEnrichment) {
        let e = e.clone();
        if e.first_name.is_some() {
            self.first_name = e.first_name;
        }
        if e.last_name.is_some() {
            self.last_name = e.last_name;
        }
        if e.title.is_some() {
            self.title = e.title;
        }
        if e.company.is_some() {
            self.company = e.company;
        }
        if e.email.is_some() {
            self.email = e.email;
        }
        if e.phone.is_some() {
            self.phone = e.phone;
        }
        if e.location.is_some() {
            self.location = e.location;
        }
        if e.provider_id.is_some() {
            self.provider_id = e.provider_id;
        }
        if e.public_identifier.is_some() {
            self.public_identifier = e.public_identifier;
        }
    }
}

/// Extract the public identifier from a profile URL
/// (`https://www.linkedin.com/in/jane-doe/` → `jane-doe`).
pub fn public_identifier_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let (_, tail) = trimmed.rsplit_once('/')?;
    if tail.is_empty() || tail.contains('.') && !trimmed.contains("/in/") {
        return None;
    }
    Some(tail.to_owned())
}

/// Fields for a new lead row, as imported from the prospect list.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub organization_id: Uuid,
    pub campaign_id: Uuid,
    pub linkedin_url: String,
    pub public_identifier: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// One record from the external prospect list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectRecord {
    pub linkedin_url: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ProspectRecord {
    pub fn into_new_lead(self, organization_id: Uuid, campaign_id: Uuid) -> NewLead {
        let public_identifier = public_identifier_from_url(&self.linkedin_url);
        NewLead {
            organization_id,
            campaign_id,
            linkedin_url: self.linkedin_url,
            public_identifier,
            first_name: self.first_name,
            last_name: self.last_name,
            title: self.title,
            company: self.company,
            email: self.email,
            phone: self.phone,
            location: self.location,
        }
    }
}

/// Attribute updates captured from a provider profile visit.
///
/// Only `Some` fields are written; existing values survive `None`.
#[derive(Debug, Clone, Default)]
pub struct LeadEnrichment {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub provider_id: Option<String>,
    pub public_identifier: Option<String>,
}

// ---------------------------------------------------------------------------
// ConnectedAccount
// ---------------------------------------------------------------------------

/// A provider sender account owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub provider: String,
    /// The provider-side id used on every API call.
    pub provider_account_id: String,
    pub status: String,
    /// Free-form provider metadata; the engine reads and writes
    /// `connection_request_blocked_until` (ISO-8601).
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectedAccount {
    /// While `now` is before this instant the sender must not issue new
    /// connection requests.
    pub fn connection_request_blocked_until(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("connection_request_blocked_until")?
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// WorkflowStep — the scheduler's ledger
// ---------------------------------------------------------------------------

/// Step lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Complete,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown step status: {other}")),
        }
    }
}

/// One scheduled unit of work for one lead at one workflow node.
///
/// `execute_after` is Unix seconds: a PENDING step is due once
/// `execute_after <= now`. `step_index` is strictly increasing along any
/// realized path for a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub lead_id: Uuid,
    /// Node id inside the campaign's workflow definition.
    pub id_in_workflow: String,
    pub step_index: i32,
    pub workflow_type: String,
    pub step_type: StepKind,
    pub status: StepStatus,
    pub retries: i32,
    /// Unix seconds.
    pub execute_after: i64,
    pub last_try_at: Option<DateTime<Utc>>,
    /// Opaque execution-result / polling-context payload.
    pub raw_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a freshly planned step.
#[derive(Debug, Clone)]
pub struct NewStep {
    pub organization_id: Uuid,
    pub lead_id: Uuid,
    pub id_in_workflow: String,
    pub step_index: i32,
    pub step_type: StepKind,
    pub execute_after: i64,
    pub retries: i32,
    pub raw_response: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_identifier_from_profile_url() {
        assert_eq!(
            public_identifier_from_url("https://www.linkedin.com/in/jane-doe/"),
            Some("jane-doe".to_owned())
        );
        assert_eq!(
            public_identifier_from_url("https://linkedin.com/in/j.doe"),
            Some("j.doe".to_owned())
        );
        assert_eq!(public_identifier_from_url("nonsense"), None);
    }

    #[test]
    fn campaign_status_round_trips_through_text() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::InProgress,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
        ] {
            let text = status.to_string();
            assert_eq!(text.parse::<CampaignStatus>().unwrap(), status);
        }
    }
}
