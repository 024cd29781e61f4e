//! Inbound provider webhooks.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ReplyEvent {
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
pub struct Attendee {
    pub attendee_provider_id: String,
}

/// Message-received webhook: flag every pending reply check of every
/// matching lead. Bookkeeping failures are logged, never surfaced — the
/// provider only needs the event acknowledged.
pub async fn capture_reply(
    State(state): State<AppState>,
    Json(event): Json<ReplyEvent>,
) -> Json<Value> {
    for attendee in &event.attendees {
        if let Err(err) = flag_replies(&state, &attendee.attendee_provider_id).await {
            warn!(
                provider_id = %attendee.attendee_provider_id,
                error = %err,
                "reply bookkeeping failed"
            );
        }
    }
    Json(json!({ "captured": true }))
}

async fn flag_replies(state: &AppState, provider_id: &str) -> Result<(), engine::EngineError> {
    let leads = state.stores.leads.find_by_provider_id(provider_id).await?;
    for lead in leads {
        let checks = state.stores.steps.list_pending_reply_checks(lead.id).await?;
        for step in checks {
            state.stores.steps.set_replied(step.id).await?;
            info!(lead = %lead.id, step = %step.id, "reply captured");
        }
    }
    Ok(())
}
