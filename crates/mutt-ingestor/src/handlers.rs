//! The three endpoints the Ingestor exposes: the authenticated write
//! path, a liveness probe, and the metrics scrape target.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use uuid::Uuid;

use mutt_queue::keys;
use mutt_types::Event;

use crate::state::{AppState, INGEST_API_KEY_NAME};

#[derive(Serialize)]
struct IngestAccepted {
    status: &'static str,
    correlation_id: String,
}

#[derive(Serialize)]
struct IngestRejected {
    status: &'static str,
    reason: String,
}

fn api_key_matches(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(provided) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let material = state.secrets.get(INGEST_API_KEY_NAME);
    if !material.detected {
        // No key configured: refuse rather than accept everything, so a
        // misconfigured deployment fails closed.
        return false;
    }
    // `SecretMaterial::matches` does the constant-time compare against
    // both CURRENT and NEXT.
    material.matches(provided)
}

pub async fn ingest(State(state): State<AppState>, headers: HeaderMap, body: axum::body::Bytes) -> impl IntoResponse {
    if !api_key_matches(&state, &headers) {
        mutt_observability::record_request("ingestor", "rejected", "auth");
        return (
            StatusCode::UNAUTHORIZED,
            Json(IngestRejected { status: "rejected", reason: "auth".to_string() }),
        )
            .into_response();
    }

    let mut event: Event = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            mutt_observability::record_request("ingestor", "rejected", "malformed_json");
            return (
                StatusCode::BAD_REQUEST,
                Json(IngestRejected { status: "rejected", reason: error.to_string() }),
            )
                .into_response();
        }
    };

    if let Err(validation_error) = event.validate() {
        mutt_observability::record_request("ingestor", "rejected", "validation");
        return (
            StatusCode::BAD_REQUEST,
            Json(IngestRejected { status: "rejected", reason: validation_error.to_string() }),
        )
            .into_response();
    }

    if event.correlation_id.is_none() {
        event.correlation_id = Some(Uuid::new_v4().to_string());
    }
    event.ingestion_timestamp = Some(chrono::Utc::now());

    let max_queue_size = state
        .dynamic_config
        .get("max_ingest_queue_size", state.static_config.max_ingest_queue_size)
        .await;
    if max_queue_size >= 0 {
        match state.queue.depth(keys::RAW_QUEUE).await {
            Ok(depth) if depth >= max_queue_size as u64 => {
                mutt_observability::record_shed("ingestor");
                mutt_observability::record_request("ingestor", "rejected", "queue_full");
                tracing::warn!(depth, max_queue_size, "rejecting ingest, raw queue at capacity");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(IngestRejected { status: "rejected", reason: "queue_full".to_string() }),
                )
                    .into_response();
            }
            Ok(_) => {}
            Err(error) => {
                tracing::error!(%error, "failed to read raw queue depth for admission control");
                mutt_observability::record_request("ingestor", "error", "substrate_unreachable");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(IngestRejected { status: "rejected", reason: "substrate_unreachable".to_string() }),
                )
                    .into_response();
            }
        }
    }

    let correlation_id = event.correlation_id.clone().unwrap_or_default();
    let payload = match serde_json::to_vec(&event) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::error!(%error, "failed to serialize validated event");
            mutt_observability::record_request("ingestor", "error", "serialization");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    if let Err(error) = state.queue.enqueue(keys::RAW_QUEUE, &payload).await {
        tracing::error!(%error, correlation_id, "failed to enqueue accepted event");
        mutt_observability::record_request("ingestor", "error", "enqueue_failed");
        return (StatusCode::SERVICE_UNAVAILABLE, "substrate unreachable").into_response();
    }

    mutt_observability::record_request("ingestor", "accepted", "ok");
    (
        StatusCode::ACCEPTED,
        Json(IngestAccepted { status: "accepted", correlation_id }),
    )
        .into_response()
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.depth(keys::RAW_QUEUE).await {
        Ok(_) => StatusCode::OK,
        Err(error) => {
            tracing::warn!(%error, "health check failed: substrate unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
