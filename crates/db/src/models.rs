//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate; the `TryFrom` impls below
//! parse the text-encoded enums and the JSONB workflow definition.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use engine::models::{Campaign, CampaignStatus, ConnectedAccount, Lead, StepStatus, WorkflowStep};
use engine::workflow::{StepKind, WorkflowDefinition};

// ---------------------------------------------------------------------------
// campaigns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub connected_account_id: Uuid,
    pub prospect_list_id: Option<String>,
    pub name: String,
    /// Full JSON workflow definition (nodes, edges).
    pub workflow: serde_json::Value,
    pub status: String,
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

impl TryFrom<CampaignRow> for Campaign {
    type Error = String;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let status: CampaignStatus = row.status.parse()?;
        let workflow = WorkflowDefinition::from_value(row.workflow)
            .map_err(|e| format!("invalid workflow definition: {e}"))?;
        Ok(Campaign {
            id: row.id,
            organization_id: row.organization_id,
            connected_account_id: row.connected_account_id,
            prospect_list_id: row.prospect_list_id,
            name: row.name,
            workflow,
            status,
            start_date: row.start_date,
            leads_per_day: row.leads_per_day,
            requests_sent_this_day: row.requests_sent_this_day,
            requests_sent_this_week: row.requests_sent_this_week,
            last_daily_requests_reset: row.last_daily_requests_reset,
            last_weekly_requests_reset: row.last_weekly_requests_reset,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// leads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct LeadRow {
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
    pub provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            organization_id: row.organization_id,
            campaign_id: row.campaign_id,
            linkedin_url: row.linkedin_url,
            public_identifier: row.public_identifier,
            first_name: row.first_name,
            last_name: row.last_name,
            title: row.title,
            company: row.company,
            email: row.email,
            phone: row.phone,
            location: row.location,
            provider_id: row.provider_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// connected_accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct ConnectedAccountRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConnectedAccountRow> for ConnectedAccount {
    fn from(row: ConnectedAccountRow) -> Self {
        ConnectedAccount {
            id: row.id,
            organization_id: row.organization_id,
            provider: row.provider,
            provider_account_id: row.provider_account_id,
            status: row.status,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// workflow_steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowStepRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub lead_id: Uuid,
    pub id_in_workflow: String,
    pub step_index: i32,
    pub workflow_type: String,
    pub step_type: String,
    pub status: String,
    pub retries: i32,
    /// Unix seconds.
    pub execute_after: i64,
    pub last_try_at: Option<DateTime<Utc>>,
    pub raw_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WorkflowStepRow> for WorkflowStep {
    type Error = String;

    fn try_from(row: WorkflowStepRow) -> Result<Self, Self::Error> {
        let step_type: StepKind = row.step_type.parse()?;
        let status: StepStatus = row.status.parse()?;
        Ok(WorkflowStep {
            id: row.id,
            organization_id: row.organization_id,
            lead_id: row.lead_id,
            id_in_workflow: row.id_in_workflow,
            step_index: row.step_index,
            workflow_type: row.workflow_type,
            step_type,
            status,
            retries: row.retries,
            execute_after: row.execute_after,
            last_try_at: row.last_try_at,
            raw_response: row.raw_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
