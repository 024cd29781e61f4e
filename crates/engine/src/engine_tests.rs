//! End-to-end engine tests over the in-memory store and the scripted
//! provider. No Postgres and no live provider session required.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use provider::mock::{MockProvider, ProviderCall};
use provider::ErrorCode;

use crate::clock;
use crate::compose::TemplateComposer;
use crate::driver::TickDriver;
use crate::executor::StepExecutor;
use crate::memory::MemoryStore;
use crate::models::{
    Campaign, CampaignStatus, ConnectedAccount, Lead, NewStep, ProspectRecord, StepStatus,
    WorkflowStep,
};
use crate::orchestrator::{CampaignOrchestrator, ProspectSource};
use crate::planner::{PollContext, POLL_INTERVAL_SECS};
use crate::ratelimit::RateLimits;
use crate::stores::Stores;
use crate::workflow::{StepKind, WorkflowDefinition};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryStore>,
    stores: Stores,
    provider: Arc<MockProvider>,
    executor: Arc<StepExecutor>,
}

fn harness_with(provider: MockProvider, limits: RateLimits) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let stores = store.clone().into_stores();
    let provider = Arc::new(provider);
    let executor = Arc::new(StepExecutor::new(
        stores.clone(),
        provider.clone(),
        Arc::new(TemplateComposer),
        limits,
    ));
    Harness { store, stores, provider, executor }
}

fn harness() -> Harness {
    harness_with(MockProvider::new(), RateLimits::default())
}

/// `invite -[accepted, 2d]-> followup; invite -[not_accepted, 2d]-> withdraw`
fn connection_workflow() -> WorkflowDefinition {
    WorkflowDefinition::from_value(json!({
        "nodes": [
            {"id": "invite", "type": "action", "data": {"type": "send_connection_request"}},
            {"id": "followup", "type": "action", "data": {"type": "send_followup"}},
            {"id": "withdraw", "type": "action", "data": {"type": "withdraw_request"}}
        ],
        "edges": [
            {"id": "e-yes", "source": "invite", "target": "followup",
             "data": {"isConditionalPath": true, "isPositive": true,
                      "delayData": {"delay": "2", "unit": "d"}}},
            {"id": "e-no", "source": "invite", "target": "withdraw",
             "data": {"isConditionalPath": true, "isPositive": false,
                      "delayData": {"delay": "2", "unit": "d"}}}
        ]
    }))
    .unwrap()
}

fn seed_account(h: &Harness) -> ConnectedAccount {
    let now = Utc::now();
    let account = ConnectedAccount {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        provider: "linkedin".to_owned(),
        provider_account_id: "acct-1".to_owned(),
        status: "connected".to_owned(),
        metadata: json!({}),
        created_at: now,
        updated_at: now,
    };
    h.store.put_account(account.clone());
    account
}

fn seed_campaign(
    h: &Harness,
    account: &ConnectedAccount,
    workflow: WorkflowDefinition,
    status: CampaignStatus,
) -> Campaign {
    let now = Utc::now();
    let campaign = Campaign {
        id: Uuid::new_v4(),
        organization_id: account.organization_id,
        connected_account_id: account.id,
        prospect_list_id: Some("list-1".to_owned()),
        name: "q2-outreach".to_owned(),
        workflow,
        status,
        start_date: None,
        leads_per_day: 10,
        requests_sent_this_day: 0,
        requests_sent_this_week: 0,
        last_daily_requests_reset: Some(now),
        last_weekly_requests_reset: Some(now),
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };
    h.store.put_campaign(campaign.clone());
    campaign
}

fn seed_lead(h: &Harness, campaign: &Campaign, slug: &str) -> Lead {
    let now = Utc::now();
    let lead = Lead {
        id: Uuid::new_v4(),
        organization_id: campaign.organization_id,
        campaign_id: campaign.id,
        linkedin_url: format!("https://www.linkedin.com/in/{slug}/"),
        public_identifier: Some(slug.to_owned()),
        first_name: None,
        last_name: None,
        title: None,
        company: None,
        email: None,
        phone: None,
        location: None,
        provider_id: None,
        created_at: now,
        updated_at: now,
    };
    h.store.put_lead(lead.clone());
    lead
}

async fn seed_entry_step(h: &Harness, lead: &Lead, node: &str, kind: StepKind) -> WorkflowStep {
    h.stores
        .steps
        .insert(NewStep {
            organization_id: lead.organization_id,
            lead_id: lead.id,
            id_in_workflow: node.to_owned(),
            step_index: 0,
            step_type: kind,
            execute_after: clock::unix_now(),
            retries: 0,
            raw_response: json!({}),
        })
        .await
        .unwrap()
}

/// A polling step whose window opened `started_ago` in the past, with
/// both branches of the connection workflow pre-resolved.
async fn seed_poll_step(
    h: &Harness,
    lead: &Lead,
    kind: StepKind,
    started_ago: Duration,
) -> WorkflowStep {
    let context = json!({
        "providerId": format!("urn:member:{}", lead.public_identifier.as_deref().unwrap()),
        "pollingStartedAt": (Utc::now() - started_ago).timestamp_millis(),
        "nextSteps": [
            {"nodeId": "followup", "edgeId": "e-yes", "delayMs": 172_800_000i64,
             "conditionalType": "accepted"},
            {"nodeId": "withdraw", "edgeId": "e-no", "delayMs": 172_800_000i64,
             "conditionalType": "not_accepted"}
        ]
    });
    h.stores
        .steps
        .insert(NewStep {
            organization_id: lead.organization_id,
            lead_id: lead.id,
            id_in_workflow: "invite".to_owned(),
            step_index: 1,
            step_type: kind,
            execute_after: clock::unix_now(),
            retries: 0,
            raw_response: context,
        })
        .await
        .unwrap()
}

struct FakeProspects(Vec<ProspectRecord>);

#[async_trait::async_trait]
impl ProspectSource for FakeProspects {
    async fn fetch(&self, _list_id: &str) -> Result<Vec<ProspectRecord>, EngineError> {
        Ok(self.0.clone())
    }
}

fn prospects(n: usize) -> Vec<ProspectRecord> {
    (0..n)
        .map(|i| ProspectRecord {
            linkedin_url: format!("https://www.linkedin.com/in/prospect-{i}/"),
            first_name: Some(format!("P{i}")),
            last_name: Some("Prospect".to_owned()),
            title: None,
            company: None,
            email: None,
            phone: None,
            location: None,
        })
        .collect()
}

fn orchestrator(h: &Harness, records: Vec<ProspectRecord>) -> CampaignOrchestrator {
    CampaignOrchestrator::new(h.stores.clone(), Arc::new(FakeProspects(records)))
}

// ---------------------------------------------------------------------------
// Scenario: the simple connection path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_request_sends_counts_and_schedules_polling() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");

    let step = seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;
    h.executor.execute_step(&step).await.unwrap();

    // The invitation went out with the default note.
    assert_eq!(h.provider.count(|c| matches!(c, ProviderCall::SendInvitation { .. })), 1);

    // Counters advanced atomically.
    let campaign = h.store.campaign(campaign.id).unwrap();
    assert_eq!(campaign.requests_sent_this_day, 1);
    assert_eq!(campaign.requests_sent_this_week, 1);

    // The entry step completed and a polling step took its place.
    let steps = h.store.steps_for_lead(lead.id);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].status, StepStatus::Complete);

    let poll = &steps[1];
    assert_eq!(poll.step_type, StepKind::CheckConnectionStatus);
    assert_eq!(poll.step_index, 1);
    assert!(poll.execute_after >= clock::unix_now() + POLL_INTERVAL_SECS - 5);

    // Both branches travel with the polling step.
    let context: PollContext = serde_json::from_value(poll.raw_response.clone()).unwrap();
    assert_eq!(context.next_steps.len(), 2);
    assert!(context.provider_id.is_some());

    // The lead picked up the provider id from the visit.
    let lead = h.stores.leads.get(lead.id).await.unwrap().unwrap();
    assert!(lead.provider_id.is_some());
}

#[tokio::test]
async fn accepted_connection_schedules_followup_immediately() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    h.provider.set_connected("jane-doe");

    let poll = seed_poll_step(&h, &lead, StepKind::CheckConnectionStatus, Duration::hours(2)).await;
    h.executor.execute_step(&poll).await.unwrap();

    let steps = h.store.steps_for_lead(lead.id);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].status, StepStatus::Complete);

    let followup = &steps[1];
    assert_eq!(followup.step_type, StepKind::SendFollowup);
    assert_eq!(followup.id_in_workflow, "followup");
    assert_eq!(followup.step_index, 2);
    // The polling window consumed the edge delay: due immediately.
    assert!(followup.execute_after <= clock::unix_now());
}

#[tokio::test]
async fn pending_connection_re_arms_the_same_polling_row() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");

    let poll = seed_poll_step(&h, &lead, StepKind::CheckConnectionStatus, Duration::hours(2)).await;
    h.executor.execute_step(&poll).await.unwrap();

    // Still one row, still pending, pushed an hour out, retries bumped.
    let steps = h.store.steps_for_lead(lead.id);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Pending);
    assert_eq!(steps[0].retries, 1);
    assert!(steps[0].execute_after >= clock::unix_now() + POLL_INTERVAL_SECS - 5);
}

// ---------------------------------------------------------------------------
// Scenario: timeout takes the withdraw branch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_timeout_schedules_withdraw_not_followup() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");

    // Window opened three days ago; the accepted branch allows two.
    let poll = seed_poll_step(&h, &lead, StepKind::CheckConnectionStatus, Duration::days(3)).await;
    h.executor.execute_step(&poll).await.unwrap();

    let steps = h.store.steps_for_lead(lead.id);
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].step_type, StepKind::WithdrawRequest);
    assert_eq!(steps[1].id_in_workflow, "withdraw");
    assert!(steps.iter().all(|s| s.step_type != StepKind::SendFollowup));
}

// ---------------------------------------------------------------------------
// Scenario: rate-limit deferral
// ---------------------------------------------------------------------------

#[tokio::test]
async fn daily_limit_defers_the_step_until_tomorrow() {
    let h = harness_with(MockProvider::new(), RateLimits { daily: 1, weekly: 200 });
    let account = seed_account(&h);
    let mut campaign =
        seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    campaign.requests_sent_this_day = 1;
    h.store.put_campaign(campaign.clone());
    let lead = seed_lead(&h, &campaign, "jane-doe");

    let step = seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;
    let before = step.execute_after;
    h.executor.execute_step(&step).await.unwrap();

    // Nothing went out; the step waits for the next daily reset.
    assert_eq!(h.provider.count(|c| matches!(c, ProviderCall::SendInvitation { .. })), 0);
    let step = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(step.status, StepStatus::Pending);
    assert!(step.execute_after > before);
    assert!(step.execute_after <= clock::unix_now() + 86_400);
}

#[tokio::test]
async fn sender_cooldown_gate_defers_without_provider_calls() {
    let h = harness();
    let mut account = seed_account(&h);
    let until = Utc::now() + Duration::hours(6);
    account.metadata = json!({
        "connection_request_blocked_until": until.to_rfc3339(),
    });
    h.store.put_account(account.clone());

    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;

    h.executor.execute_step(&step).await.unwrap();

    assert!(h.provider.calls().is_empty());
    let step = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(step.status, StepStatus::Pending);
    assert_eq!(step.execute_after, until.timestamp());
}

// ---------------------------------------------------------------------------
// Scenario: cannot_resend_yet applies a sender-wide cooldown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cannot_resend_yet_blocks_the_sender_across_campaigns() {
    let provider = MockProvider::new()
        .failing_invitations(ErrorCode::CannotResendYet, "invited too recently");
    let h = harness_with(provider, RateLimits::default());
    let account = seed_account(&h);

    let campaign_a =
        seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead_a = seed_lead(&h, &campaign_a, "jane-doe");
    let step_a = seed_entry_step(&h, &lead_a, "invite", StepKind::SendConnectionRequest).await;

    // A second campaign on the same sender, with its own pending request.
    let campaign_b =
        seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead_b = seed_lead(&h, &campaign_b, "john-roe");
    let step_b = seed_entry_step(&h, &lead_b, "invite", StepKind::SendConnectionRequest).await;

    h.executor.execute_step(&step_a).await.unwrap();

    // The failing step is FAILED with a bumped retry count.
    let step_a = h.stores.steps.get(step_a.id).await.unwrap().unwrap();
    assert_eq!(step_a.status, StepStatus::Failed);
    assert_eq!(step_a.retries, 1);
    assert!(step_a.last_try_at.is_some());

    // The sender carries a ~24 h block.
    let account = h.store.account(account.id).unwrap();
    let blocked_until = account.connection_request_blocked_until().unwrap();
    let hours = (blocked_until - Utc::now()).num_hours();
    assert!((23..=24).contains(&hours), "expected ~24h cooldown, got {hours}h");

    // The sibling campaign's pending request moved past the cooldown.
    let step_b = h.stores.steps.get(step_b.id).await.unwrap().unwrap();
    assert_eq!(step_b.status, StepStatus::Pending);
    assert!(step_b.execute_after >= blocked_until.timestamp());
}

// ---------------------------------------------------------------------------
// Scenario: a reply terminates the branch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reply_completes_the_poll_with_no_successors() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");

    let poll = seed_poll_step(&h, &lead, StepKind::CheckMessageReply, Duration::hours(1)).await;
    // The inbound webhook saw a reply.
    h.stores.steps.set_replied(poll.id).await.unwrap();

    let poll = h.stores.steps.get(poll.id).await.unwrap().unwrap();
    h.executor.execute_step(&poll).await.unwrap();

    let steps = h.store.steps_for_lead(lead.id);
    assert_eq!(steps.len(), 1, "a reply must not spawn successors");
    assert_eq!(steps[0].status, StepStatus::Complete);
    assert_eq!(steps[0].raw_response["hasReplied"], true);
}

#[tokio::test]
async fn silent_reply_poll_keeps_waiting_inside_the_window() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");

    let poll = seed_poll_step(&h, &lead, StepKind::CheckMessageReply, Duration::hours(2)).await;
    h.executor.execute_step(&poll).await.unwrap();

    let steps = h.store.steps_for_lead(lead.id);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Pending);
    // The reply poll never asks the provider.
    assert_eq!(h.provider.count(|c| matches!(c, ProviderCall::IsConnected { .. })), 0);
}

// ---------------------------------------------------------------------------
// Paused campaigns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn paused_campaign_leaves_due_steps_untouched() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::Paused);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;

    h.executor.execute_step(&step).await.unwrap();

    let after = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(after.status, StepStatus::Pending);
    assert_eq!(after.execute_after, step.execute_after);
    assert!(h.provider.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Tick idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn processing_due_steps_twice_changes_nothing_new() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;

    let driver = Arc::new(TickDriver::new(
        h.stores.clone(),
        h.executor.clone(),
        Arc::new(orchestrator(&h, Vec::new())),
    ));

    driver.process_due_steps().await;
    let first_pass = h.store.all_steps();
    // The only remaining pending step is the polling step, due in an hour.
    driver.process_due_steps().await;
    let second_pass = h.store.all_steps();

    assert_eq!(first_pass.len(), second_pass.len());
    for (a, b) in first_pass.iter().zip(&second_pass) {
        assert_eq!(a.status, b.status);
        assert_eq!(a.execute_after, b.execute_after);
        assert_eq!(a.retries, b.retries);
    }
}

// ---------------------------------------------------------------------------
// Failed-step retry sweep
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retry_sweep_re_arms_and_re_executes_failed_steps() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;
    h.stores.steps.mark_failed(step.id, "socket closed").await.unwrap();

    let driver = Arc::new(TickDriver::new(
        h.stores.clone(),
        h.executor.clone(),
        Arc::new(orchestrator(&h, Vec::new())),
    ));
    driver.retry_failed_steps().await;

    // The retry succeeded this time: step completed, invitation sent.
    let step = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(step.status, StepStatus::Complete);
    assert_eq!(h.provider.count(|c| matches!(c, ProviderCall::SendInvitation { .. })), 1);
}

// ---------------------------------------------------------------------------
// Orchestrator lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_campaign_imports_prospects_in_bulk() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::Draft);

    let orch = orchestrator(&h, prospects(7));
    orch.start_campaign(campaign.id).await.unwrap();

    assert_eq!(h.store.campaign(campaign.id).unwrap().status, CampaignStatus::InProgress);
    assert_eq!(h.store.leads_of(campaign.id).len(), 7);

    // Starting a running campaign is a validation error.
    let err = orch.start_campaign(campaign.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn restarting_a_paused_campaign_keeps_leads_and_counters() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::Draft);

    let orch = orchestrator(&h, prospects(4));
    orch.start_campaign(campaign.id).await.unwrap();
    orch.pause_campaign(campaign.id).await.unwrap();

    // Some traffic happened before the pause.
    let mut paused = h.store.campaign(campaign.id).unwrap();
    paused.requests_sent_this_day = 5;
    paused.requests_sent_this_week = 12;
    h.store.put_campaign(paused);

    orch.start_campaign(campaign.id).await.unwrap();
    orch.pause_campaign(campaign.id).await.unwrap();

    let campaign = h.store.campaign(campaign.id).unwrap();
    assert_eq!(h.store.leads_of(campaign.id).len(), 4, "restart must not duplicate leads");
    assert_eq!(campaign.requests_sent_this_day, 5);
    assert_eq!(campaign.requests_sent_this_week, 12);
    assert_eq!(campaign.status, CampaignStatus::Paused);
}

#[tokio::test]
async fn pause_and_resume_enforce_the_state_machine() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::Draft);
    let orch = orchestrator(&h, Vec::new());

    // Draft campaigns can be neither paused nor resumed.
    assert!(matches!(
        orch.pause_campaign(campaign.id).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        orch.resume_campaign(campaign.id).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        orch.campaign_status(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));

    orch.start_campaign(campaign.id).await.unwrap();
    orch.pause_campaign(campaign.id).await.unwrap();
    // Pausing twice is fine.
    orch.pause_campaign(campaign.id).await.unwrap();

    let status = orch.campaign_status(campaign.id).await.unwrap();
    assert!(status.is_paused);
    assert!(!status.is_running);

    orch.resume_campaign(campaign.id).await.unwrap();
    let status = orch.campaign_status(campaign.id).await.unwrap();
    assert!(status.is_running);
}

// ---------------------------------------------------------------------------
// Daily admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admission_caps_at_leads_per_day_and_skips_started_leads() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);

    let leads: Vec<Lead> =
        (0..30).map(|i| seed_lead(&h, &campaign, &format!("lead-{i}"))).collect();
    // Three leads already started.
    for lead in &leads[..3] {
        seed_entry_step(&h, lead, "invite", StepKind::SendConnectionRequest).await;
    }

    let orch = orchestrator(&h, Vec::new());
    let admitted = orch.admit_daily_leads(&campaign).await.unwrap();
    assert_eq!(admitted, 10);

    let steps = h.store.all_steps();
    assert_eq!(steps.len(), 13);
    let started: Vec<_> = steps.iter().map(|s| s.lead_id).collect();
    // No lead got a second entry step.
    let mut deduped = started.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), started.len());

    // Every new step sits at the entry node, due immediately.
    let now = clock::unix_now();
    for step in steps.iter().skip(3) {
        assert_eq!(step.id_in_workflow, "invite");
        assert_eq!(step.step_index, 0);
        assert!(step.execute_after <= now);
    }
}

#[tokio::test]
async fn admission_completes_the_campaign_once_everyone_started() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "only-lead");
    seed_entry_step(&h, &lead, "invite", StepKind::SendConnectionRequest).await;

    let orch = orchestrator(&h, Vec::new());
    assert_eq!(orch.admit_daily_leads(&campaign).await.unwrap(), 0);
    assert_eq!(h.store.campaign(campaign.id).unwrap().status, CampaignStatus::Completed);
}

#[tokio::test]
async fn admission_completes_an_empty_campaign() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);

    let orch = orchestrator(&h, Vec::new());
    assert_eq!(orch.admit_daily_leads(&campaign).await.unwrap(), 0);
    assert_eq!(h.store.campaign(campaign.id).unwrap().status, CampaignStatus::Completed);
}

// ---------------------------------------------------------------------------
// Post engagement kinds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn like_post_is_a_no_op_without_recent_posts() {
    let h = harness();
    let account = seed_account(&h);
    let workflow = WorkflowDefinition::from_value(json!({
        "nodes": [{"id": "like", "type": "action", "data": {"type": "like_post"}}],
        "edges": []
    }))
    .unwrap();
    let campaign = seed_campaign(&h, &account, workflow, CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "like", StepKind::LikePost).await;

    h.executor.execute_step(&step).await.unwrap();

    let step = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(step.status, StepStatus::Complete);
    assert_eq!(step.raw_response["skipped"], "no_recent_posts");
    assert_eq!(h.provider.count(|c| matches!(c, ProviderCall::ReactToPost { .. })), 0);
}

#[tokio::test]
async fn comment_post_personalises_with_the_authors_first_name() {
    let provider = MockProvider::new().with_posts(vec![provider::Post {
        id: "post-9".to_owned(),
        author_first_name: Some("Jane".to_owned()),
        author_last_name: Some("Doe".to_owned()),
        text: Some("shipping season".to_owned()),
        posted_at: Some(Utc::now()),
    }]);
    let h = harness_with(provider, RateLimits::default());
    let account = seed_account(&h);
    let workflow = WorkflowDefinition::from_value(json!({
        "nodes": [{"id": "comment", "type": "action",
                   "data": {"type": "comment_post",
                            "config": {"customComment": "Well said {{first_name}}!"}}}],
        "edges": []
    }))
    .unwrap();
    let campaign = seed_campaign(&h, &account, workflow, CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "comment", StepKind::CommentPost).await;

    h.executor.execute_step(&step).await.unwrap();

    let comments = h.provider.calls();
    let text = comments
        .iter()
        .find_map(|c| match c {
            ProviderCall::CommentPost { text, .. } => Some(text.clone()),
            _ => None,
        })
        .expect("a comment was posted");
    assert_eq!(text, "Well said Jane!");
}

#[tokio::test]
async fn withdraw_cancels_the_matching_invitation() {
    let provider = MockProvider::new().with_invitations(vec![provider::Invitation {
        id: "inv-1".to_owned(),
        invited_provider_id: "urn:member:jane-doe".to_owned(),
        sent_at: Some(Utc::now()),
    }]);
    let h = harness_with(provider, RateLimits::default());
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "withdraw", StepKind::WithdrawRequest).await;

    h.executor.execute_step(&step).await.unwrap();

    assert_eq!(
        h.provider.count(|c| matches!(c, ProviderCall::CancelInvitation { .. })),
        1
    );
    let step = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(step.raw_response["withdrawnInvitationId"], "inv-1");
}

#[tokio::test]
async fn unknown_node_marks_the_step_failed() {
    let h = harness();
    let account = seed_account(&h);
    let campaign = seed_campaign(&h, &account, connection_workflow(), CampaignStatus::InProgress);
    let lead = seed_lead(&h, &campaign, "jane-doe");
    let step = seed_entry_step(&h, &lead, "no-such-node", StepKind::ProfileVisit).await;

    h.executor.execute_step(&step).await.unwrap();

    let step = h.stores.steps.get(step.id).await.unwrap().unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.raw_response["error"], "Node not found in workflow");
}
