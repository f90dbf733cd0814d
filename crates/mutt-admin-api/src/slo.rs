//! `GET /api/v1/slo` — a thin per-component health contract. Real
//! burn-rate computation needs a metrics time series this service
//! doesn't own; this reports the point-in-time signals the admin surface
//! has on hand (queue depth, breaker state) so a caller gets a stable
//! shape to build against, per the open contract in `spec.md` §6.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::auth::authenticated;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ComponentSlo {
    pub component: &'static str,
    pub queue_depth: Option<u64>,
    pub breaker_state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SloReport {
    pub components: Vec<ComponentSlo>,
}

pub async fn get(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let ingestor_depth = state.queue.depth(mutt_queue::keys::RAW_QUEUE).await.ok();
    let alerter_depth = state.queue.depth(mutt_queue::keys::RAW_QUEUE).await.ok();
    let forwarder_depth = state.queue.depth(mutt_queue::keys::ALERT_QUEUE).await.ok();
    let breaker_state = state.queue.get(&mutt_queue::keys::breaker::state_key("moog")).await.ok().flatten();

    let report = SloReport {
        components: vec![
            ComponentSlo { component: "ingestor", queue_depth: ingestor_depth, breaker_state: None },
            ComponentSlo { component: "alerter", queue_depth: alerter_depth, breaker_state: None },
            ComponentSlo { component: "forwarder", queue_depth: forwarder_depth, breaker_state: breaker_state.clone() },
            ComponentSlo { component: "remediator", queue_depth: None, breaker_state: None },
        ],
    };

    Json(report).into_response()
}
