//! Shared-secret auth for every mutating (and filtered-read) endpoint.
//! Same fail-closed, constant-time pattern the Ingestor uses for its
//! inbound write path.

use axum::http::HeaderMap;

use crate::state::{AppState, ADMIN_API_KEY_NAME};

pub fn authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(provided) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let material = state.secrets.get(ADMIN_API_KEY_NAME);
    if !material.detected {
        return false;
    }
    material.matches(provided)
}
