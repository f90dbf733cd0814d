//! `/api/v2/teams` — the host/device-to-team override registry.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::auth::authenticated;
use crate::error::AdminError;
use crate::state::AppState;
use crate::store;
use crate::util::{actor_of, correlation_id_of};

#[derive(Deserialize)]
pub struct TeamMutation {
    #[serde(default)]
    pub device_pattern: Option<String>,
    pub team: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match store::list_device_teams(&state.pool).await {
        Ok(teams) => Json(teams).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn create(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<TeamMutation>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(device_pattern) = body.device_pattern else {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"status": "rejected", "reason": "device_pattern required"}))).into_response();
    };
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::add_device_team(&mut tx, &device_pattern, &body.team, &actor, body.reason, correlation_id).await;
    match result {
        Ok(team) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "device_teams").await;
            (StatusCode::CREATED, Json(team)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<TeamMutation>,
) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::update_device_team(&mut tx, id, &body.team, &actor, body.reason, correlation_id).await;
    match result {
        Ok(team) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "device_teams").await;
            Json(team).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub async fn remove(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<i64>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::remove_device_team(&mut tx, id, &actor, None, correlation_id).await;
    match result {
        Ok(()) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "device_teams").await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(error) => error.into_response(),
    }
}
