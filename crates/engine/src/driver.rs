//! Tick driver — the four periodic tasks.
//!
//! Each task runs sequentially on its own worker; a tick that outlasts
//! its cadence simply skips the missed firings
//! (`MissedTickBehavior::Skip`), so at most one tick per task is ever in
//! flight. Errors inside one unit of work (one campaign, one step) are
//! logged and never abort the tick.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Local, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::clock;
use crate::executor::StepExecutor;
use crate::orchestrator::CampaignOrchestrator;
use crate::stores::Stores;

const HOURLY: StdDuration = StdDuration::from_secs(3_600);
const MINUTELY: StdDuration = StdDuration::from_secs(60);

/// Owns the periodic work that drives campaigns forward.
pub struct TickDriver {
    stores: Stores,
    executor: Arc<StepExecutor>,
    orchestrator: Arc<CampaignOrchestrator>,
}

impl TickDriver {
    pub fn new(
        stores: Stores,
        executor: Arc<StepExecutor>,
        orchestrator: Arc<CampaignOrchestrator>,
    ) -> Self {
        Self { stores, executor, orchestrator }
    }

    /// Spawn the four workers. They run until `shutdown` flips to true.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();

        {
            let driver = self.clone();
            let mut shutdown = shutdown.clone();
            tasks.spawn(async move {
                let mut ticker = interval(HOURLY);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => driver.check_scheduled_campaigns().await,
                        _ = shutdown.changed() => break,
                    }
                }
            });
        }

        {
            let driver = self.clone();
            let mut shutdown = shutdown.clone();
            tasks.spawn(async move {
                loop {
                    // Admission runs once a day, at local midnight.
                    let now = Local::now();
                    let until_midnight = (clock::next_midnight(&now) - now)
                        .to_std()
                        .unwrap_or(StdDuration::from_secs(60));
                    tokio::select! {
                        _ = tokio::time::sleep(until_midnight) => driver.start_daily_leads().await,
                        _ = shutdown.changed() => break,
                    }
                }
            });
        }

        {
            let driver = self.clone();
            let mut shutdown = shutdown.clone();
            tasks.spawn(async move {
                let mut ticker = interval(MINUTELY);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => driver.process_due_steps().await,
                        _ = shutdown.changed() => break,
                    }
                }
            });
        }

        {
            let driver = self;
            let mut shutdown = shutdown;
            tasks.spawn(async move {
                let mut ticker = interval(HOURLY);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => driver.retry_failed_steps().await,
                        _ = shutdown.changed() => break,
                    }
                }
            });
        }

        tasks
    }

    /// Start every scheduled campaign whose start date has passed.
    pub async fn check_scheduled_campaigns(&self) {
        let due = match self.stores.campaigns.list_due_scheduled(Utc::now()).await {
            Ok(campaigns) => campaigns,
            Err(err) => {
                error!(error = %err, "failed to list scheduled campaigns");
                return;
            }
        };
        for campaign in due {
            if let Err(err) = self.orchestrator.start_campaign(campaign.id).await {
                warn!(campaign = %campaign.id, error = %err, "scheduled start failed");
            }
        }
    }

    /// Admit the daily lead quota for every running campaign.
    pub async fn start_daily_leads(&self) {
        let running = match self.stores.campaigns.list_in_progress().await {
            Ok(campaigns) => campaigns,
            Err(err) => {
                error!(error = %err, "failed to list running campaigns");
                return;
            }
        };
        for campaign in running {
            if let Err(err) = self.orchestrator.admit_daily_leads(&campaign).await {
                warn!(campaign = %campaign.id, error = %err, "daily admission failed");
            }
        }
    }

    /// Execute every due PENDING step, one at a time, in store order.
    pub async fn process_due_steps(&self) {
        let due = match self.stores.steps.list_due_pending(clock::unix_now()).await {
            Ok(steps) => steps,
            Err(err) => {
                error!(error = %err, "failed to list due steps");
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        info!(count = due.len(), "processing due steps");
        for step in due {
            if let Err(err) = self.executor.execute_step(&step).await {
                warn!(step = %step.id, error = %err, "step processing failed");
            }
        }
    }

    /// Re-arm FAILED steps of running campaigns and execute them again
    /// immediately.
    pub async fn retry_failed_steps(&self) {
        let running = match self.stores.campaigns.list_in_progress().await {
            Ok(campaigns) => campaigns,
            Err(err) => {
                error!(error = %err, "failed to list running campaigns");
                return;
            }
        };
        for campaign in running {
            if let Err(err) = self.retry_campaign_failures(campaign.id).await {
                warn!(campaign = %campaign.id, error = %err, "retry sweep failed");
            }
        }
    }

    async fn retry_campaign_failures(
        &self,
        campaign_id: uuid::Uuid,
    ) -> Result<(), crate::EngineError> {
        let lead_ids: Vec<_> = self
            .stores
            .leads
            .list_by_campaign(campaign_id)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        let failed = self.stores.steps.list_failed_for_leads(&lead_ids).await?;
        for step in failed {
            if let Err(err) = self.retry_one(step.id).await {
                warn!(step = %step.id, error = %err, "step retry failed");
            }
        }
        Ok(())
    }

    async fn retry_one(&self, step_id: uuid::Uuid) -> Result<(), crate::EngineError> {
        self.stores.steps.re_arm_failed(step_id, clock::unix_now()).await?;
        let Some(step) = self.stores.steps.get(step_id).await? else {
            return Ok(());
        };
        self.executor.execute_step(&step).await
    }
}
