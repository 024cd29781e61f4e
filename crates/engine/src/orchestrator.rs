//! Campaign orchestrator — lifecycle operations and daily lead admission.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::clock;
use crate::error::EngineError;
use crate::graph;
use crate::models::{Campaign, CampaignStatus, NewStep, ProspectRecord};
use crate::stores::Stores;
use crate::workflow::StepKind;

/// Lead rows created per parallel batch during campaign start.
const INGEST_CHUNK_SIZE: usize = 5;

/// Resolves a campaign's prospect-list reference into records.
///
/// CSV parsing and object-storage access live behind this seam; the
/// engine only sees the parsed records.
#[async_trait]
pub trait ProspectSource: Send + Sync {
    async fn fetch(&self, list_id: &str) -> Result<Vec<ProspectRecord>, EngineError>;
}

/// Status summary returned by `campaign_status`.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignStatusView {
    pub status: CampaignStatus,
    pub is_running: bool,
    pub is_paused: bool,
}

/// Public campaign operations.
pub struct CampaignOrchestrator {
    stores: Stores,
    prospects: Arc<dyn ProspectSource>,
}

impl CampaignOrchestrator {
    pub fn new(stores: Stores, prospects: Arc<dyn ProspectSource>) -> Self {
        Self { stores, prospects }
    }

    /// Import the prospect list and move the campaign to `in_progress`.
    ///
    /// Restarting a paused or failed campaign is allowed; prospects whose
    /// profile URL was already imported are skipped, so a restart never
    /// duplicates leads.
    pub async fn start_campaign(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let campaign = self.require_campaign(campaign_id).await?;

        if campaign.is_deleted {
            return Err(EngineError::Validation("campaign is deleted".to_owned()));
        }
        match campaign.status {
            CampaignStatus::InProgress => {
                return Err(EngineError::Validation("campaign is already running".to_owned()));
            }
            CampaignStatus::Completed => {
                return Err(EngineError::Validation("campaign is already completed".to_owned()));
            }
            _ => {}
        }

        if self.stores.accounts.get(campaign.connected_account_id).await?.is_none() {
            return Err(EngineError::Validation("sender account is not connected".to_owned()));
        }
        let list_id = campaign
            .prospect_list_id
            .as_deref()
            .ok_or_else(|| EngineError::Validation("campaign has no prospect list".to_owned()))?;

        let prospects = self.prospects.fetch(list_id).await?;

        let existing: HashSet<String> = self
            .stores
            .leads
            .list_by_campaign(campaign.id)
            .await?
            .into_iter()
            .map(|l| l.linkedin_url)
            .collect();

        let new_leads: Vec<_> = prospects
            .into_iter()
            .filter(|p| !existing.contains(&p.linkedin_url))
            .map(|p| p.into_new_lead(campaign.organization_id, campaign.id))
            .collect();

        let total = new_leads.len();
        for chunk in new_leads.chunks(INGEST_CHUNK_SIZE) {
            try_join_all(chunk.iter().cloned().map(|lead| self.stores.leads.insert(lead)))
                .await?;
        }

        self.stores.campaigns.set_status(campaign.id, CampaignStatus::InProgress).await?;
        info!(campaign = %campaign.id, leads = total, "campaign started");
        Ok(())
    }

    /// `in_progress` → `paused`. Idempotent when already paused.
    pub async fn pause_campaign(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let campaign = self.require_campaign(campaign_id).await?;
        match campaign.status {
            CampaignStatus::Paused => Ok(()),
            CampaignStatus::InProgress => {
                self.stores.campaigns.set_status(campaign.id, CampaignStatus::Paused).await?;
                info!(campaign = %campaign.id, "campaign paused");
                Ok(())
            }
            other => Err(EngineError::Validation(format!(
                "cannot pause a campaign in status {other}"
            ))),
        }
    }

    /// `paused` → `in_progress`.
    pub async fn resume_campaign(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let campaign = self.require_campaign(campaign_id).await?;
        match campaign.status {
            CampaignStatus::Paused => {
                self.stores.campaigns.set_status(campaign.id, CampaignStatus::InProgress).await?;
                info!(campaign = %campaign.id, "campaign resumed");
                Ok(())
            }
            other => Err(EngineError::Validation(format!(
                "cannot resume a campaign in status {other}"
            ))),
        }
    }

    pub async fn campaign_status(
        &self,
        campaign_id: Uuid,
    ) -> Result<CampaignStatusView, EngineError> {
        let campaign = self.require_campaign(campaign_id).await?;
        Ok(CampaignStatusView {
            status: campaign.status,
            is_running: campaign.status == CampaignStatus::InProgress,
            is_paused: campaign.status == CampaignStatus::Paused,
        })
    }

    /// Admit up to `leads_per_day` unstarted leads onto the workflow by
    /// creating their entry-node step, due immediately. Marks the
    /// campaign completed once every lead has started.
    ///
    /// Returns how many leads were admitted.
    pub async fn admit_daily_leads(&self, campaign: &Campaign) -> Result<usize, EngineError> {
        let leads = self.stores.leads.list_by_campaign(campaign.id).await?;
        if leads.is_empty() {
            self.stores.campaigns.set_status(campaign.id, CampaignStatus::Completed).await?;
            info!(campaign = %campaign.id, "no leads, campaign completed");
            return Ok(0);
        }

        let lead_ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();
        let started: HashSet<Uuid> = self
            .stores
            .steps
            .list_for_leads(&lead_ids)
            .await?
            .into_iter()
            .map(|s| s.lead_id)
            .collect();

        let mut unstarted: Vec<_> =
            leads.into_iter().filter(|l| !started.contains(&l.id)).collect();
        if unstarted.is_empty() {
            self.stores.campaigns.set_status(campaign.id, CampaignStatus::Completed).await?;
            info!(campaign = %campaign.id, "all leads started, campaign completed");
            return Ok(0);
        }

        let entry = graph::entry_node(&campaign.workflow).ok_or_else(|| {
            EngineError::Validation("workflow has no executable nodes".to_owned())
        })?;
        let entry_kind = entry.data.kind.map(StepKind::from).ok_or_else(|| {
            EngineError::Validation("workflow entry node has no action".to_owned())
        })?;

        unstarted.shuffle(&mut rand::thread_rng());
        let quota = campaign.leads_per_day.max(0) as usize;
        let admitted = unstarted.len().min(quota);
        let now = clock::unix_now();

        for lead in unstarted.into_iter().take(admitted) {
            self.stores
                .steps
                .insert(NewStep {
                    organization_id: lead.organization_id,
                    lead_id: lead.id,
                    id_in_workflow: entry.id.clone(),
                    step_index: 0,
                    step_type: entry_kind,
                    execute_after: now,
                    retries: 0,
                    raw_response: serde_json::Value::Object(Default::default()),
                })
                .await?;
        }

        info!(campaign = %campaign.id, admitted, "daily leads admitted");
        Ok(admitted)
    }

    async fn require_campaign(&self, id: Uuid) -> Result<Campaign, EngineError> {
        self.stores
            .campaigns
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {id}")))
    }
}
