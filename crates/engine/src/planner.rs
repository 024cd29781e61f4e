//! Successor planner — decides what happens after a step completes.
//!
//! Pure: takes the completed step, its execution result, and the
//! workflow graph, and returns a [`Plan`] the executor applies to the
//! step store. Exactly one edge hop happens per completed step; the
//! monotone `step_index` plus edge-driven progression keeps cyclic
//! definitions from looping inside a single planning pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::{self, BranchOutcome, NextStep};
use crate::models::{NewStep, WorkflowStep};
use crate::workflow::{StepKind, WorkflowDefinition};

/// Poll cadence for asynchronous outcomes.
pub const POLL_INTERVAL_SECS: i64 = 3_600;

/// Which outcome a freshly created polling step observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    ConnectionStatus,
    MessageReply,
}

impl From<PollKind> for StepKind {
    fn from(kind: PollKind) -> Self {
        match kind {
            PollKind::ConnectionStatus => StepKind::CheckConnectionStatus,
            PollKind::MessageReply => StepKind::CheckMessageReply,
        }
    }
}

/// What a step handler produced.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Execution result persisted as the step's `raw_response`.
    pub result: Value,
    /// Set when the step needs an asynchronous outcome observed.
    pub poll: Option<PollKind>,
}

impl StepOutcome {
    pub fn done(result: Value) -> Self {
        Self { result, poll: None }
    }

    pub fn polling(result: Value, poll: PollKind) -> Self {
        Self { result, poll: Some(poll) }
    }
}

/// Context stored in a polling step's `raw_response` at creation time.
///
/// Carries the pre-resolved branch targets so a polling completion never
/// re-reads the workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollContext {
    pub provider_id: Option<String>,
    /// Unix milliseconds when polling began.
    pub polling_started_at: i64,
    pub next_steps: Vec<NextStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_replied: Option<bool>,
}

/// Execution result of a polling step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_replied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub next_steps: Vec<NextStep>,
    #[serde(default)]
    pub polling_started_at: i64,
    pub should_continue_polling: bool,
    pub has_timed_out: bool,
}

/// The executor's marching orders after a successful step.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Mark the step COMPLETE and create these successors (possibly
    /// none, which terminates the lead's branch).
    Complete { successors: Vec<NewStep> },
    /// Keep the same ledger row PENDING for another polling round.
    ContinuePolling { execute_after: i64, retries: i32, raw_response: Value },
}

/// Plan what follows a successfully executed step.
pub fn plan_successors(
    step: &WorkflowStep,
    outcome: &StepOutcome,
    workflow: &WorkflowDefinition,
    now_secs: i64,
) -> Plan {
    if step.step_type.is_polling() {
        plan_after_poll(step, &outcome.result, workflow, now_secs)
    } else {
        plan_after_action(step, outcome, workflow, now_secs)
    }
}

fn plan_after_poll(
    step: &WorkflowStep,
    result: &Value,
    workflow: &WorkflowDefinition,
    now_secs: i64,
) -> Plan {
    let Ok(poll) = serde_json::from_value::<PollOutcome>(result.clone()) else {
        // Context lost; nothing sensible to branch on.
        return Plan::Complete { successors: Vec::new() };
    };

    if poll.should_continue_polling {
        return Plan::ContinuePolling {
            execute_after: now_secs + POLL_INTERVAL_SECS,
            retries: step.retries + 1,
            raw_response: result.clone(),
        };
    }

    // A reply ends the lead's path outright.
    if step.step_type == StepKind::CheckMessageReply && poll.has_replied == Some(true) {
        return Plan::Complete { successors: Vec::new() };
    }

    let accepted = poll.is_connected == Some(true) || poll.has_replied == Some(true);
    let wanted = if accepted { BranchOutcome::Accepted } else { BranchOutcome::NotAccepted };

    let successors = poll
        .next_steps
        .iter()
        .find(|n| n.conditional_type == Some(wanted))
        .and_then(|n| successor_at(step, workflow, n, now_secs))
        .into_iter()
        .collect();

    Plan::Complete { successors }
}

fn plan_after_action(
    step: &WorkflowStep,
    outcome: &StepOutcome,
    workflow: &WorkflowDefinition,
    now_secs: i64,
) -> Plan {
    let next_steps = graph::outgoing(workflow, &step.id_in_workflow);
    if next_steps.is_empty() {
        return Plan::Complete { successors: Vec::new() };
    }

    if let Some(poll) = outcome.poll {
        let context = PollContext {
            provider_id: outcome
                .result
                .get("providerId")
                .and_then(Value::as_str)
                .map(str::to_owned),
            polling_started_at: outcome
                .result
                .get("pollingStartedAt")
                .and_then(Value::as_i64)
                .unwrap_or(now_secs * 1_000),
            next_steps,
            has_replied: None,
        };
        let raw_response =
            serde_json::to_value(&context).unwrap_or_else(|_| Value::Object(Default::default()));
        return Plan::Complete {
            successors: vec![NewStep {
                organization_id: step.organization_id,
                lead_id: step.lead_id,
                id_in_workflow: step.id_in_workflow.clone(),
                step_index: step.step_index + 1,
                step_type: poll.into(),
                execute_after: now_secs + POLL_INTERVAL_SECS,
                retries: 0,
                raw_response,
            }],
        };
    }

    // Non-polling fan-out: conditional markers are ignored here; one
    // successor per outgoing edge, each honoring its own delay.
    let successors = next_steps
        .iter()
        .filter_map(|n| successor_with_delay(step, workflow, n, now_secs))
        .collect();
    Plan::Complete { successors }
}

/// Successor due immediately (the polling window already consumed the
/// edge delay).
fn successor_at(
    step: &WorkflowStep,
    workflow: &WorkflowDefinition,
    next: &NextStep,
    now_secs: i64,
) -> Option<NewStep> {
    let node = workflow.node(&next.node_id)?;
    Some(NewStep {
        organization_id: step.organization_id,
        lead_id: step.lead_id,
        id_in_workflow: node.id.clone(),
        step_index: step.step_index + 1,
        step_type: StepKind::from(node.data.kind?),
        execute_after: now_secs,
        retries: 0,
        raw_response: Value::Object(Default::default()),
    })
}

fn successor_with_delay(
    step: &WorkflowStep,
    workflow: &WorkflowDefinition,
    next: &NextStep,
    now_secs: i64,
) -> Option<NewStep> {
    let mut successor = successor_at(step, workflow, next, now_secs)?;
    successor.execute_after = now_secs + next.delay_ms / 1_000;
    Some(successor)
}
