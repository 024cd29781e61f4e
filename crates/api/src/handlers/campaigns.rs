//! Campaign control operations.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use engine::orchestrator::CampaignStatusView;

use super::{error_status, AppState};

pub async fn start(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.orchestrator.start_campaign(id).await {
        Ok(()) => Ok(Json(json!({ "started": true }))),
        Err(err) => Err(reject(err)),
    }
}

pub async fn pause(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.orchestrator.pause_campaign(id).await {
        Ok(()) => Ok(Json(json!({ "paused": true }))),
        Err(err) => Err(reject(err)),
    }
}

pub async fn resume(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.orchestrator.resume_campaign(id).await {
        Ok(()) => Ok(Json(json!({ "resumed": true }))),
        Err(err) => Err(reject(err)),
    }
}

pub async fn status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CampaignStatusView>, (StatusCode, Json<Value>)> {
    match state.orchestrator.campaign_status(id).await {
        Ok(view) => Ok(Json(view)),
        Err(err) => Err(reject(err)),
    }
}

fn reject(err: engine::EngineError) -> (StatusCode, Json<Value>) {
    (error_status(&err), Json(json!({ "error": err.to_string() })))
}
