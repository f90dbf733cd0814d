//! Error-adjacent shared types. Each service's own error taxonomy lives
//! next to its call sites (`thiserror` enums in `mutt-admin-api::error`
//! and similar), since what a caller does next — retry, DLQ, reject —
//! differs enough per service that a shared enum just grew a second,
//! unreferenced vocabulary alongside the real one. Only the wire-level
//! DLQ annotation is genuinely shared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attached to every DLQ/quarantine entry so operators can triage from the
/// quarantine view without re-deriving context from logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoisonRecord {
    pub error_type: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
}

impl PoisonRecord {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>, retry_count: u32) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
            retry_count,
        }
    }
}
