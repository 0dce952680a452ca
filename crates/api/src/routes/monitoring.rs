//! Monitoring Routes

use axum::{extract::State, Json};
use monitor::{MonitorStatus, SessionReport};
use serde::Serialize;
use uuid::Uuid;

use crate::{ApiError, SharedState};

/// Response for the start endpoint
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub user_id: String,
}

/// Begin monitoring; 409 if a session is already open
pub async fn start(State(state): State<SharedState>) -> Result<Json<StartResponse>, ApiError> {
    let session_id = state.controller.start_monitoring().await?;
    Ok(Json(StartResponse {
        session_id,
        user_id: state.controller.user_id().to_string(),
    }))
}

/// End monitoring; 409 if no session is open
pub async fn stop(State(state): State<SharedState>) -> Result<Json<SessionReport>, ApiError> {
    Ok(Json(state.controller.stop_monitoring().await?))
}

pub async fn get_status(State(state): State<SharedState>) -> Json<MonitorStatus> {
    Json(state.controller.status().await)
}
