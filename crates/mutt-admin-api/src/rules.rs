//! `/api/v2/rules` — list, fetch, create, update, and soft-delete
//! classification rules.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::auth::authenticated;
use crate::error::AdminError;
use crate::state::AppState;
use crate::store::{self, RuleInput};
use crate::util::{actor_of, correlation_id_of};

#[derive(Deserialize)]
pub struct MutationMeta {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RuleMutation {
    #[serde(flatten)]
    pub rule: RuleInput,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match store::list_rules(&state.pool).await {
        Ok(rules) => Json(rules).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn get(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<i64>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match store::get_rule(&state.pool, id).await {
        Ok(Some(rule)) => Json(rule).into_response(),
        Ok(None) => AdminError::NotFound.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn create(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<RuleMutation>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let rule = match body.rule.into_rule(0) {
        Ok(rule) => rule,
        Err(error) => return AdminError::RuleValidation(error).into_response(),
    };

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::create_rule(&mut tx, rule, &actor, body.reason, correlation_id.clone()).await;
    match result {
        Ok(view) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "rules").await;
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RuleMutation>,
) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let rule = match body.rule.into_rule(id) {
        Ok(rule) => rule,
        Err(error) => return AdminError::RuleValidation(error).into_response(),
    };

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let result = store::update_rule(&mut tx, id, rule, &actor, body.reason, correlation_id.clone()).await;
    match result {
        Ok(view) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "rules").await;
            Json(view).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub async fn deactivate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(meta): Json<MutationMeta>,
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
    let result = store::deactivate_rule(&mut tx, id, &actor, meta.reason, correlation_id.clone()).await;
    match result {
        Ok(()) => {
            if let Err(error) = tx.commit().await {
                return AdminError::Sqlx(error).into_response();
            }
            let _ = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, "rules").await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(error) => error.into_response(),
    }
}
