//! In-memory store — a test double for every store trait.
//!
//! Keeps all four tables in one mutex-guarded struct so cross-table
//! queries (sender-wide step deferral) work the same way as in Postgres.
//! Used throughout the engine test suites and by dry runs; production
//! wiring uses the `db` crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignStatus, ConnectedAccount, Lead, LeadEnrichment, NewLead, NewStep,
    StepStatus, WorkflowStep, CAMPAIGN_WORKFLOW,
};
use crate::ratelimit::CounterPatch;
use crate::stores::{AccountStore, CampaignStore, LeadStore, StepStore, StoreError, Stores};
use crate::workflow::StepKind;

#[derive(Default)]
struct Inner {
    campaigns: HashMap<Uuid, Campaign>,
    accounts: HashMap<Uuid, ConnectedAccount>,
    leads: Vec<Lead>,
    steps: Vec<WorkflowStep>,
}

/// All four stores behind one mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle one shared instance into a [`Stores`] handle.
    pub fn into_stores(self: Arc<Self>) -> Stores {
        Stores {
            campaigns: self.clone(),
            leads: self.clone(),
            accounts: self.clone(),
            steps: self,
        }
    }

    // ---- seeding helpers ---------------------------------------------------

    pub fn put_campaign(&self, campaign: Campaign) {
        self.inner.lock().unwrap().campaigns.insert(campaign.id, campaign);
    }

    pub fn put_account(&self, account: ConnectedAccount) {
        self.inner.lock().unwrap().accounts.insert(account.id, account);
    }

    pub fn put_lead(&self, lead: Lead) {
        self.inner.lock().unwrap().leads.push(lead);
    }

    // ---- inspection helpers ------------------------------------------------

    /// Snapshot of the whole step ledger, in store order.
    pub fn all_steps(&self) -> Vec<WorkflowStep> {
        self.inner.lock().unwrap().steps.clone()
    }

    pub fn steps_for_lead(&self, lead_id: Uuid) -> Vec<WorkflowStep> {
        self.inner
            .lock()
            .unwrap()
            .steps
            .iter()
            .filter(|s| s.lead_id == lead_id)
            .cloned()
            .collect()
    }

    pub fn campaign(&self, id: Uuid) -> Option<Campaign> {
        self.inner.lock().unwrap().campaigns.get(&id).cloned()
    }

    pub fn account(&self, id: Uuid) -> Option<ConnectedAccount> {
        self.inner.lock().unwrap().accounts.get(&id).cloned()
    }

    pub fn leads_of(&self, campaign_id: Uuid) -> Vec<Lead> {
        self.inner
            .lock()
            .unwrap()
            .leads
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect()
    }
}

fn step_mut(inner: &mut Inner, id: Uuid) -> Result<&mut WorkflowStep, StoreError> {
    inner.steps.iter_mut().find(|s| s.id == id).ok_or(StoreError::NotFound)
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        Ok(self.inner.lock().unwrap().campaigns.get(&id).cloned())
    }

    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| {
                !c.is_deleted
                    && matches!(c.status, CampaignStatus::Draft | CampaignStatus::Scheduled)
                    && c.start_date.is_some_and(|d| d <= now)
            })
            .cloned()
            .collect())
    }

    async fn list_in_progress(&self) -> Result<Vec<Campaign>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| !c.is_deleted && c.status == CampaignStatus::InProgress)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let campaign = inner.campaigns.get_mut(&id).ok_or(StoreError::NotFound)?;
        campaign.status = status;
        campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_counters(&self, id: Uuid, patch: &CounterPatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let campaign = inner.campaigns.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(day) = patch.requests_sent_this_day {
            campaign.requests_sent_this_day = day;
        }
        if let Some(week) = patch.requests_sent_this_week {
            campaign.requests_sent_this_week = week;
        }
        if let Some(at) = patch.last_daily_requests_reset {
            campaign.last_daily_requests_reset = Some(at);
        }
        if let Some(at) = patch.last_weekly_requests_reset {
            campaign.last_weekly_requests_reset = Some(at);
        }
        campaign.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Lead>, StoreError> {
        Ok(self.inner.lock().unwrap().leads.iter().find(|l| l.id == id).cloned())
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Lead>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .leads
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let now = Utc::now();
        let row = Lead {
            id: Uuid::new_v4(),
            organization_id: lead.organization_id,
            campaign_id: lead.campaign_id,
            linkedin_url: lead.linkedin_url,
            public_identifier: lead.public_identifier,
            first_name: lead.first_name,
            last_name: lead.last_name,
            title: lead.title,
            company: lead.company,
            email: lead.email,
            phone: lead.phone,
            location: lead.location,
            provider_id: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().leads.push(row.clone());
        Ok(row)
    }

    async fn update_enrichment(
        &self,
        id: Uuid,
        enrichment: &LeadEnrichment,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let lead = inner.leads.iter_mut().find(|l| l.id == id).ok_or(StoreError::NotFound)?;
        lead.apply_enrichment(enrichment);
        lead.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Vec<Lead>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .leads
            .iter()
            .filter(|l| l.provider_id.as_deref() == Some(provider_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<ConnectedAccount>, StoreError> {
        Ok(self.inner.lock().unwrap().accounts.get(&id).cloned())
    }

    async fn set_connection_block(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = inner.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if !account.metadata.is_object() {
            account.metadata = Value::Object(Default::default());
        }
        if let Some(map) = account.metadata.as_object_mut() {
            map.insert(
                "connection_request_blocked_until".to_owned(),
                Value::String(until.to_rfc3339()),
            );
        }
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl StepStore for MemoryStore {
    async fn insert(&self, step: NewStep) -> Result<WorkflowStep, StoreError> {
        let now = Utc::now();
        let row = WorkflowStep {
            id: Uuid::new_v4(),
            organization_id: step.organization_id,
            lead_id: step.lead_id,
            id_in_workflow: step.id_in_workflow,
            step_index: step.step_index,
            workflow_type: CAMPAIGN_WORKFLOW.to_owned(),
            step_type: step.step_type,
            status: StepStatus::Pending,
            retries: step.retries,
            execute_after: step.execute_after,
            last_try_at: None,
            raw_response: step.raw_response,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().steps.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WorkflowStep>, StoreError> {
        Ok(self.inner.lock().unwrap().steps.iter().find(|s| s.id == id).cloned())
    }

    async fn list_due_pending(&self, now_secs: i64) -> Result<Vec<WorkflowStep>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending && s.execute_after <= now_secs)
            .cloned()
            .collect())
    }

    async fn list_for_leads(&self, lead_ids: &[Uuid]) -> Result<Vec<WorkflowStep>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .steps
            .iter()
            .filter(|s| lead_ids.contains(&s.lead_id))
            .cloned()
            .collect())
    }

    async fn list_failed_for_leads(
        &self,
        lead_ids: &[Uuid],
    ) -> Result<Vec<WorkflowStep>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed && lead_ids.contains(&s.lead_id))
            .cloned()
            .collect())
    }

    async fn list_pending_reply_checks(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .steps
            .iter()
            .filter(|s| {
                s.lead_id == lead_id
                    && s.status == StepStatus::Pending
                    && s.step_type == StepKind::CheckMessageReply
            })
            .cloned()
            .collect())
    }

    async fn mark_complete(&self, id: Uuid, raw_response: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let step = step_mut(&mut inner, id)?;
        step.status = StepStatus::Complete;
        step.raw_response = raw_response.clone();
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let step = step_mut(&mut inner, id)?;
        let now = Utc::now();
        step.status = StepStatus::Failed;
        step.retries += 1;
        step.last_try_at = Some(now);
        step.raw_response = serde_json::json!({ "error": error });
        step.updated_at = now;
        Ok(())
    }

    async fn reschedule(&self, id: Uuid, execute_after: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let step = step_mut(&mut inner, id)?;
        step.execute_after = execute_after;
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn re_arm_poll(
        &self,
        id: Uuid,
        execute_after: i64,
        retries: i32,
        raw_response: &Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let step = step_mut(&mut inner, id)?;
        step.status = StepStatus::Pending;
        step.execute_after = execute_after;
        step.retries = retries;
        step.raw_response = raw_response.clone();
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn re_arm_failed(&self, id: Uuid, now_secs: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let step = step_mut(&mut inner, id)?;
        step.status = StepStatus::Pending;
        step.execute_after = now_secs;
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn set_replied(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let step = step_mut(&mut inner, id)?;
        if !step.raw_response.is_object() {
            step.raw_response = Value::Object(Default::default());
        }
        if let Some(map) = step.raw_response.as_object_mut() {
            map.insert("hasReplied".to_owned(), Value::Bool(true));
        }
        step.updated_at = Utc::now();
        Ok(())
    }

    async fn defer_connection_requests(
        &self,
        account_id: Uuid,
        execute_after: i64,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let lead_ids: Vec<Uuid> = inner
            .leads
            .iter()
            .filter(|l| {
                inner
                    .campaigns
                    .get(&l.campaign_id)
                    .is_some_and(|c| c.connected_account_id == account_id)
            })
            .map(|l| l.id)
            .collect();

        let mut deferred = 0;
        for step in inner.steps.iter_mut() {
            if step.status == StepStatus::Pending
                && step.step_type == StepKind::SendConnectionRequest
                && lead_ids.contains(&step.lead_id)
                && step.execute_after < execute_after
            {
                step.execute_after = execute_after;
                step.updated_at = Utc::now();
                deferred += 1;
            }
        }
        Ok(deferred)
    }
}
