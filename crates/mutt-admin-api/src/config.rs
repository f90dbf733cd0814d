//! `/api/v1/config` — reads and mutations of the dynamic config keyspace.
//! Writes bypass `mutt_config::DynamicConfigClient` (that client is
//! read/invalidate-only by design) and go straight to the substrate, then
//! publish so every subscriber converges within one round.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::authenticated;
use crate::error::AdminError;
use crate::state::AppState;
use crate::store::write_config_audit;
use crate::util::{actor_of, correlation_id_of};

#[derive(Deserialize)]
pub struct ConfigMutation {
    pub value: Value,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn get(State(state): State<AppState>, headers: HeaderMap, Path(name): Path<String>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.queue.get(&mutt_queue::keys::config_key(&name)).await {
        Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Json(value).into_response(),
            Err(_) => Json(Value::String(raw)).into_response(),
        },
        Ok(None) => AdminError::NotFound.into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to read dynamic config entry");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

pub async fn put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<ConfigMutation>,
) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = actor_of(&headers);
    let correlation_id = correlation_id_of(&headers);

    let old_raw = state.queue.get(&mutt_queue::keys::config_key(&name)).await.ok().flatten();
    let old_value = old_raw.as_deref().and_then(|raw| serde_json::from_str::<Value>(raw).ok());

    let serialized = match serde_json::to_string(&body.value) {
        Ok(s) => s,
        Err(error) => {
            tracing::error!(%error, "failed to serialize dynamic config value");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    if let Err(error) = state.queue.set(&mutt_queue::keys::config_key(&name), &serialized).await {
        tracing::error!(%error, "failed to write dynamic config entry");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(error) => return AdminError::Sqlx(error).into_response(),
    };
    let audit_result = write_config_audit(
        &mut tx,
        mutt_types::ConfigAuditRow {
            actor,
            operation: if old_value.is_some() { mutt_types::ConfigOperation::Update } else { mutt_types::ConfigOperation::Create },
            table_name: "dynamic_config".to_string(),
            record_id: name.clone(),
            old_value,
            new_value: Some(body.value.clone()),
            reason: body.reason,
            correlation_id,
        },
    )
    .await;
    if let Err(error) = audit_result {
        return error.into_response();
    }
    if let Err(error) = tx.commit().await {
        return AdminError::Sqlx(error).into_response();
    }

    if let Err(error) = state.queue.publish(mutt_queue::keys::CONFIG_UPDATES_TOPIC, &name).await {
        tracing::warn!(%error, name, "dynamic config write committed but change notification failed to publish");
    }

    Json(body.value).into_response()
}
