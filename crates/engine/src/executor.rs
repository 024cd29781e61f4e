//! Step executor — runs one due ledger step end to end.
//!
//! `execute_step` resolves the step's lead, campaign, and sender, then
//! dispatches on the step kind. Gates (sender cooldown, rate limit)
//! defer the step by pushing `execute_after`; success marks it COMPLETE
//! and applies the successor plan; failure marks it FAILED and, for a
//! provider `cannot_resend_yet` on a connection request, applies the
//! sender-wide cooldown.

use std::sync::Arc;

use chrono::{Duration, Local, Utc};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use provider::{Post, ProviderClient, ProviderProfile, ReactionType};

use crate::clock;
use crate::compose::{MessageComposer, DEFAULT_COMMENT, DEFAULT_CONNECTION_MESSAGE, DEFAULT_FOLLOWUP_MESSAGE};
use crate::error::EngineError;
use crate::graph::BranchOutcome;
use crate::models::{Campaign, CampaignStatus, ConnectedAccount, Lead, LeadEnrichment, WorkflowStep};
use crate::planner::{self, Plan, PollContext, PollKind, PollOutcome, StepOutcome};
use crate::ratelimit::{self, RateLimits};
use crate::stores::Stores;
use crate::template;
use crate::workflow::{NodeConfig, StepKind};

/// Cooldown applied to a sender after the provider signals
/// `cannot_resend_yet`.
const SENDER_COOLDOWN_HOURS: i64 = 24;

/// How many days of posts to consider when a node doesn't configure it.
const DEFAULT_POST_LOOKBACK_DAYS: u32 = 7;

/// Upper bound on posts fetched for the random pick.
const POST_FETCH_LIMIT: u32 = 20;

/// What dispatch decided for a due step.
enum Disposition {
    /// The step ran; persist the outcome and plan successors.
    Completed(StepOutcome),
    /// A gate blocked the step; it stays PENDING until `execute_after`.
    Deferred { execute_after: i64 },
}

/// Executes due workflow steps against the stores and the provider.
pub struct StepExecutor {
    stores: Stores,
    provider: Arc<dyn ProviderClient>,
    composer: Arc<dyn MessageComposer>,
    limits: RateLimits,
}

impl StepExecutor {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn ProviderClient>,
        composer: Arc<dyn MessageComposer>,
        limits: RateLimits,
    ) -> Self {
        Self { stores, provider, composer, limits }
    }

    /// Run one PENDING step. Never propagates provider failures: those
    /// mark the step FAILED and the tick moves on.
    pub async fn execute_step(&self, step: &WorkflowStep) -> Result<(), EngineError> {
        let Some(lead) = self.stores.leads.get(step.lead_id).await? else {
            return self.fail_step(step, "lead not found").await;
        };
        let Some(campaign) = self.stores.campaigns.get(lead.campaign_id).await? else {
            return self.fail_step(step, "campaign not found").await;
        };
        // Pause is the cancellation signal: leave the step untouched.
        if campaign.status == CampaignStatus::Paused {
            debug!(step = %step.id, campaign = %campaign.id, "campaign paused, skipping step");
            return Ok(());
        }
        let Some(account) = self.stores.accounts.get(campaign.connected_account_id).await? else {
            return self.fail_step(step, "sender account not found").await;
        };
        if campaign.workflow.node(&step.id_in_workflow).is_none() {
            return self.fail_step(step, "Node not found in workflow").await;
        }

        match self.dispatch(step, &lead, &campaign, &account).await {
            Ok(Disposition::Deferred { execute_after }) => {
                debug!(step = %step.id, execute_after, "step deferred by gate");
                self.stores.steps.reschedule(step.id, execute_after).await?;
                Ok(())
            }
            Ok(Disposition::Completed(outcome)) => {
                let now = clock::unix_now();
                match planner::plan_successors(step, &outcome, &campaign.workflow, now) {
                    Plan::ContinuePolling { execute_after, retries, raw_response } => {
                        self.stores
                            .steps
                            .re_arm_poll(step.id, execute_after, retries, &raw_response)
                            .await?;
                    }
                    Plan::Complete { successors } => {
                        self.stores.steps.mark_complete(step.id, &outcome.result).await?;
                        for successor in successors {
                            self.stores.steps.insert(successor).await?;
                        }
                    }
                }
                Ok(())
            }
            Err(err) => {
                warn!(step = %step.id, error = %err, "step execution failed");
                self.stores.steps.mark_failed(step.id, &err.to_string()).await?;
                let resend_blocked = err
                    .as_provider()
                    .is_some_and(provider::ProviderError::is_cannot_resend_yet);
                if resend_blocked && step.step_type == StepKind::SendConnectionRequest {
                    self.apply_sender_cooldown(&account).await?;
                }
                Ok(())
            }
        }
    }

    async fn fail_step(&self, step: &WorkflowStep, message: &str) -> Result<(), EngineError> {
        warn!(step = %step.id, message, "marking step failed");
        self.stores.steps.mark_failed(step.id, message).await?;
        Ok(())
    }

    async fn dispatch(
        &self,
        step: &WorkflowStep,
        lead: &Lead,
        campaign: &Campaign,
        account: &ConnectedAccount,
    ) -> Result<Disposition, EngineError> {
        let config = campaign
            .workflow
            .node(&step.id_in_workflow)
            .map(|n| n.data.config.clone())
            .unwrap_or_default();

        match step.step_type {
            StepKind::ProfileVisit => self.run_profile_visit(lead, account).await,
            StepKind::SendConnectionRequest => {
                self.run_connection_request(lead, campaign, account, &config).await
            }
            StepKind::SendFollowup => self.run_followup(lead, account, &config).await,
            StepKind::LikePost => self.run_like_post(lead, account, &config).await,
            StepKind::CommentPost => self.run_comment_post(lead, account, &config).await,
            StepKind::WithdrawRequest => self.run_withdraw(lead, account).await,
            // Reserved kinds: no external effect, treated as success.
            StepKind::Webhook | StepKind::SendInmail => {
                Ok(Disposition::Completed(StepOutcome::done(json!({}))))
            }
            StepKind::CheckConnectionStatus => self.run_connection_poll(step, lead, account).await,
            StepKind::CheckMessageReply => self.run_reply_poll(step).await,
        }
    }

    // -----------------------------------------------------------------------
    // Regular step handlers
    // -----------------------------------------------------------------------

    async fn run_profile_visit(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
    ) -> Result<Disposition, EngineError> {
        let (profile, _) = self.visit_and_enrich(lead, account).await?;
        Ok(Disposition::Completed(StepOutcome::done(json!({
            "providerId": profile.provider_id,
        }))))
    }

    async fn run_connection_request(
        &self,
        lead: &Lead,
        campaign: &Campaign,
        account: &ConnectedAccount,
        config: &NodeConfig,
    ) -> Result<Disposition, EngineError> {
        // Gate 1: sender-wide cooldown.
        if let Some(until) = account.connection_request_blocked_until() {
            if until > Utc::now() {
                info!(account = %account.id, %until, "sender cooling down, deferring");
                return Ok(Disposition::Deferred { execute_after: until.timestamp() });
            }
        }

        // Gate 2: per-campaign rate limit. The reset patch is persisted
        // even when the verdict is "wait".
        let decision = ratelimit::check(campaign, &self.limits, Local::now());
        if !decision.can_proceed {
            if !decision.patch.is_empty() {
                self.stores.campaigns.apply_counters(campaign.id, &decision.patch).await?;
            }
            let wait = decision
                .wait
                .expect("check() returns Some(wait) whenever can_proceed is false");
            info!(
                campaign = %campaign.id,
                wait_secs = wait.num_seconds(),
                "request budget exhausted, deferring"
            );
            return Ok(Disposition::Deferred {
                execute_after: clock::unix_now() + wait.num_seconds(),
            });
        }

        let (profile, lead) = self.visit_and_enrich(lead, account).await?;

        let message = if config.use_ai {
            self.composer.connection_message(&lead).await?
        } else if let Some(custom) = &config.custom_message {
            custom.clone()
        } else {
            DEFAULT_CONNECTION_MESSAGE.to_owned()
        };

        self.provider
            .send_invitation(&account.provider_account_id, &profile.provider_id, &message)
            .await?;

        // One write carries both the reset (if any) and the increment.
        self.stores
            .campaigns
            .apply_counters(campaign.id, &decision.patch_with_increment())
            .await?;

        Ok(Disposition::Completed(StepOutcome::polling(
            json!({
                "providerId": profile.provider_id,
                "pollingStartedAt": Utc::now().timestamp_millis(),
            }),
            PollKind::ConnectionStatus,
        )))
    }

    async fn run_followup(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
        config: &NodeConfig,
    ) -> Result<Disposition, EngineError> {
        let (profile, lead) = self.visit_and_enrich(lead, account).await?;

        let raw = if config.configure_with_ai {
            self.composer.followup_message(&lead).await?
        } else if let Some(custom) = &config.custom_message {
            custom.clone()
        } else {
            DEFAULT_FOLLOWUP_MESSAGE.to_owned()
        };
        let text = template::render(
            &raw,
            &[
                ("first_name", lead.first_name.as_deref()),
                ("last_name", lead.last_name.as_deref()),
                ("company", lead.company.as_deref()),
            ],
        );

        self.provider
            .start_or_continue_chat(
                &account.provider_account_id,
                std::slice::from_ref(&profile.provider_id),
                &text,
            )
            .await?;

        Ok(Disposition::Completed(StepOutcome::polling(
            json!({
                "providerId": profile.provider_id,
                "pollingStartedAt": Utc::now().timestamp_millis(),
            }),
            PollKind::MessageReply,
        )))
    }

    async fn run_like_post(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
        config: &NodeConfig,
    ) -> Result<Disposition, EngineError> {
        let Some(post) = self.pick_recent_post(lead, account, config).await? else {
            return Ok(Disposition::Completed(StepOutcome::done(
                json!({"skipped": "no_recent_posts"}),
            )));
        };
        let reaction = ReactionType::parse_or_default(config.reaction_type.as_deref());
        self.provider
            .react_to_post(&account.provider_account_id, &post.id, reaction)
            .await?;
        Ok(Disposition::Completed(StepOutcome::done(json!({
            "postId": post.id,
            "reaction": reaction.as_str(),
        }))))
    }

    async fn run_comment_post(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
        config: &NodeConfig,
    ) -> Result<Disposition, EngineError> {
        let Some(post) = self.pick_recent_post(lead, account, config).await? else {
            return Ok(Disposition::Completed(StepOutcome::done(
                json!({"skipped": "no_recent_posts"}),
            )));
        };

        let author_vars = [("first_name", post.author_first_name.as_deref())];
        let text = if config.configure_with_ai {
            self.composer.post_comment(lead, &post).await?
        } else if let Some(custom) = &config.custom_comment {
            template::render(custom, &author_vars)
        } else {
            template::render(DEFAULT_COMMENT, &author_vars)
        };

        self.provider
            .comment_post(&account.provider_account_id, &post.id, &text)
            .await?;
        Ok(Disposition::Completed(StepOutcome::done(json!({
            "postId": post.id,
            "comment": text,
        }))))
    }

    async fn run_withdraw(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
    ) -> Result<Disposition, EngineError> {
        let provider_id = match &lead.provider_id {
            Some(id) => id.clone(),
            None => self.visit_and_enrich(lead, account).await?.0.provider_id,
        };

        let invitations =
            self.provider.list_invitations_sent(&account.provider_account_id).await?;
        match invitations.iter().find(|inv| inv.invited_provider_id == provider_id) {
            Some(invitation) => {
                self.provider
                    .cancel_invitation(&account.provider_account_id, &invitation.id)
                    .await?;
                Ok(Disposition::Completed(StepOutcome::done(json!({
                    "withdrawnInvitationId": invitation.id,
                }))))
            }
            None => Ok(Disposition::Completed(StepOutcome::done(
                json!({"skipped": "no_invitation_found"}),
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Polling step handlers
    // -----------------------------------------------------------------------

    async fn run_connection_poll(
        &self,
        step: &WorkflowStep,
        lead: &Lead,
        account: &ConnectedAccount,
    ) -> Result<Disposition, EngineError> {
        let ctx = poll_context(step)?;
        let identifier = lead_identifier(lead)?;
        let is_connected = self
            .provider
            .is_connected(&account.provider_account_id, &identifier)
            .await?;

        let (has_timed_out, should_continue) =
            poll_window(&ctx, is_connected);

        let result = PollOutcome {
            is_connected: Some(is_connected),
            has_replied: None,
            provider_id: ctx.provider_id,
            next_steps: ctx.next_steps,
            polling_started_at: ctx.polling_started_at,
            should_continue_polling: should_continue,
            has_timed_out,
        };
        Ok(Disposition::Completed(StepOutcome::done(to_value(&result))))
    }

    /// The reply poll never asks the provider; the inbound webhook has
    /// already written `hasReplied` into the step's context if a reply
    /// arrived.
    async fn run_reply_poll(&self, step: &WorkflowStep) -> Result<Disposition, EngineError> {
        let ctx = poll_context(step)?;
        let has_replied = ctx.has_replied == Some(true);

        let (has_timed_out, should_continue) = poll_window(&ctx, has_replied);

        let result = PollOutcome {
            is_connected: None,
            has_replied: Some(has_replied),
            provider_id: ctx.provider_id,
            next_steps: ctx.next_steps,
            polling_started_at: ctx.polling_started_at,
            should_continue_polling: should_continue,
            has_timed_out,
        };
        Ok(Disposition::Completed(StepOutcome::done(to_value(&result))))
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    /// Visit the lead's profile, persist the enriched attributes, and
    /// return both the profile and the lead with those attributes
    /// applied.
    async fn visit_and_enrich(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
    ) -> Result<(ProviderProfile, Lead), EngineError> {
        let identifier = lead_identifier(lead)?;
        let profile = self
            .provider
            .visit_profile(&account.provider_account_id, &identifier, false)
            .await?;

        let enrichment = enrichment_from_profile(&profile);
        self.stores.leads.update_enrichment(lead.id, &enrichment).await?;

        let mut updated = lead.clone();
        updated.apply_enrichment(&enrichment);
        Ok((profile, updated))
    }

    async fn pick_recent_post(
        &self,
        lead: &Lead,
        account: &ConnectedAccount,
        config: &NodeConfig,
    ) -> Result<Option<Post>, EngineError> {
        let identifier = lead_identifier(lead)?;
        let last_days = config.last_days.unwrap_or(DEFAULT_POST_LOOKBACK_DAYS);
        let posts = self
            .provider
            .list_recent_posts(&account.provider_account_id, &identifier, last_days, POST_FETCH_LIMIT)
            .await?;
        Ok(posts.choose(&mut rand::thread_rng()).cloned())
    }

    /// Block the sender for 24 h and push every affected pending
    /// connection-request step past the cooldown. Safe to repeat.
    async fn apply_sender_cooldown(&self, account: &ConnectedAccount) -> Result<(), EngineError> {
        let until = Utc::now() + Duration::hours(SENDER_COOLDOWN_HOURS);
        self.stores.accounts.set_connection_block(account.id, until).await?;
        let deferred = self
            .stores
            .steps
            .defer_connection_requests(account.id, until.timestamp())
            .await?;
        info!(account = %account.id, %until, deferred, "sender cooldown applied");
        Ok(())
    }
}

fn lead_identifier(lead: &Lead) -> Result<String, EngineError> {
    lead.identifier().ok_or_else(|| {
        EngineError::Validation(format!("lead {} has no public identifier", lead.id))
    })
}

fn poll_context(step: &WorkflowStep) -> Result<PollContext, EngineError> {
    serde_json::from_value(step.raw_response.clone())
        .map_err(|_| EngineError::Validation("polling step lost its context".to_owned()))
}

/// Timeout window shared by both polling kinds: the window is the
/// `accepted` branch's delay, and polling continues while the outcome is
/// still pending inside it.
fn poll_window(ctx: &PollContext, outcome_observed: bool) -> (bool, bool) {
    let timeout_ms = ctx
        .next_steps
        .iter()
        .find(|n| n.conditional_type == Some(BranchOutcome::Accepted))
        .map(|n| n.delay_ms)
        .unwrap_or(0);
    let elapsed_ms = Utc::now().timestamp_millis() - ctx.polling_started_at;
    let has_timed_out = elapsed_ms > timeout_ms;
    let should_continue = !outcome_observed && !has_timed_out;
    (has_timed_out, should_continue)
}

fn enrichment_from_profile(profile: &ProviderProfile) -> LeadEnrichment {
    LeadEnrichment {
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        title: profile.headline.clone(),
        company: profile.company.clone(),
        email: profile.emails.first().cloned(),
        phone: profile.phones.first().cloned(),
        location: profile.location.clone(),
        provider_id: Some(profile.provider_id.clone()),
        public_identifier: profile.public_identifier.clone(),
    }
}

fn to_value(outcome: &PollOutcome) -> Value {
    serde_json::to_value(outcome).unwrap_or_else(|_| Value::Object(Default::default()))
}
