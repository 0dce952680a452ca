//! User Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use storage::UserProfile;

use crate::{ApiError, SharedState};

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub created: bool,
}

/// Stats for display, seconds rounded to two decimals
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub user_id: String,
    pub sleep_incidents: u64,
    pub total_sleep_time: f64,
    pub focused_time: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub async fn register_user(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".into()));
    }

    let profile = UserProfile {
        name: request.name,
        age: request.age,
    };
    if !state.controller.store().register_user(user_id, profile)? {
        return Err(ApiError::Conflict(format!("User {} already exists", user_id)));
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user_id.to_string(),
            created: true,
        }),
    ))
}

pub async fn get_stats(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.controller.store().stats(&user_id)?;
    Ok(Json(StatsResponse {
        user_id,
        sleep_incidents: stats.sleep_incidents,
        total_sleep_time: round2(stats.total_sleep_time),
        focused_time: round2(stats.focused_time),
    }))
}
