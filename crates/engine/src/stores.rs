//! Store traits — the persistence seams of the engine.
//!
//! Each trait exposes only the semantic queries the engine actually
//! issues; the Postgres implementations live in the `db` crate and an
//! in-memory implementation backs the test suites (see
//! [`crate::memory`]). Persistence is the synchronization medium: no
//! in-memory lock is ever held across one of these calls.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignStatus, ConnectedAccount, Lead, LeadEnrichment, NewLead, NewStep,
    WorkflowStep,
};
use crate::ratelimit::CounterPatch;

/// Persistence failure, backend-agnostic.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("storage error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Campaign>, StoreError>;

    /// Non-deleted campaigns in `draft`/`scheduled` whose `start_date`
    /// has passed.
    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError>;

    /// Non-deleted campaigns currently `in_progress`.
    async fn list_in_progress(&self) -> Result<Vec<Campaign>, StoreError>;

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<(), StoreError>;

    /// Apply a counter patch in a single write. Fields left `None` keep
    /// their stored value.
    async fn apply_counters(&self, id: Uuid, patch: &CounterPatch) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Lead>, StoreError>;

    async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Lead>, StoreError>;

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError>;

    /// Merge enriched attributes captured from a profile visit; `None`
    /// fields keep their stored value.
    async fn update_enrichment(&self, id: Uuid, enrichment: &LeadEnrichment)
        -> Result<(), StoreError>;

    /// Leads whose stored provider id matches (reply-webhook lookup).
    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Vec<Lead>, StoreError>;
}

// ---------------------------------------------------------------------------
// Sender accounts
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ConnectedAccount>, StoreError>;

    /// Record the sender-wide connection-request cooldown in the
    /// account's metadata.
    async fn set_connection_block(&self, id: Uuid, until: DateTime<Utc>)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Workflow steps
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StepStore: Send + Sync {
    async fn insert(&self, step: NewStep) -> Result<WorkflowStep, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<WorkflowStep>, StoreError>;

    /// PENDING steps with `execute_after <= now`, in store order.
    async fn list_due_pending(&self, now_secs: i64) -> Result<Vec<WorkflowStep>, StoreError>;

    /// Every step belonging to the given leads.
    async fn list_for_leads(&self, lead_ids: &[Uuid]) -> Result<Vec<WorkflowStep>, StoreError>;

    /// FAILED steps belonging to the given leads.
    async fn list_failed_for_leads(&self, lead_ids: &[Uuid])
        -> Result<Vec<WorkflowStep>, StoreError>;

    /// PENDING `check_message_reply` steps for one lead.
    async fn list_pending_reply_checks(&self, lead_id: Uuid)
        -> Result<Vec<WorkflowStep>, StoreError>;

    /// PENDING → COMPLETE with the execution result as `raw_response`.
    async fn mark_complete(&self, id: Uuid, raw_response: &Value) -> Result<(), StoreError>;

    /// → FAILED: bump `retries`, stamp `last_try_at`, store the error.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Push a PENDING step's due time without touching anything else
    /// (gate deferrals).
    async fn reschedule(&self, id: Uuid, execute_after: i64) -> Result<(), StoreError>;

    /// Keep a polling step PENDING for another round: new due time,
    /// bumped retries, refreshed polling context.
    async fn re_arm_poll(
        &self,
        id: Uuid,
        execute_after: i64,
        retries: i32,
        raw_response: &Value,
    ) -> Result<(), StoreError>;

    /// FAILED → PENDING, due immediately.
    async fn re_arm_failed(&self, id: Uuid, now_secs: i64) -> Result<(), StoreError>;

    /// Flag a reply on a PENDING `check_message_reply` step
    /// (`raw_response.hasReplied = true`).
    async fn set_replied(&self, id: Uuid) -> Result<(), StoreError>;

    /// Defer every PENDING `send_connection_request` step of every lead
    /// of every campaign using the given sender account, to at least
    /// `execute_after`. Returns the number of deferred steps.
    async fn defer_connection_requests(
        &self,
        account_id: Uuid,
        execute_after: i64,
    ) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The four stores, bundled for handlers that need them all.
#[derive(Clone)]
pub struct Stores {
    pub campaigns: Arc<dyn CampaignStore>,
    pub leads: Arc<dyn LeadStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub steps: Arc<dyn StepStore>,
}
