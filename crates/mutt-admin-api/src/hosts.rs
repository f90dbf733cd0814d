//! `/api/v2/dev-hosts` — the development-host registry.

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
pub struct DevHostMutation {
    pub hostname: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match store::list_dev_hosts(&state.pool).await {
        Ok(hosts) => Json(hosts).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn add(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<DevHostMutation>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::add_dev_host(&mut tx, &body.hostname, body.reason.as_deref(), &actor, body.reason.clone(), correlation_id).await;
    match result {
        Ok(host) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "dev_hosts").await;
            (StatusCode::CREATED, Json(host)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub async fn remove(State(state): State<AppState>, headers: HeaderMap, Path(hostname): Path<String>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::remove_dev_host(&mut tx, &hostname, &actor, None, correlation_id).await;
    match result {
        Ok(()) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "dev_hosts").await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(error) => error.into_response(),
    }
}
