//! Audit log row types. Both logs are append-only: rows are never updated
//! or deleted once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row per classified event, in `event_audit_log` (monthly partitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAuditRow {
    pub event_time: DateTime<Utc>,
    pub hostname: String,
    pub matched_rule_id: Option<i64>,
    pub handling: String,
    pub forwarded: bool,
    pub correlation_id: Option<String>,
    pub raw_event: Value,
}

/// The kind of write a config mutation performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOperation {
    Create,
    Update,
    Delete,
}

/// One row per write to rules/dev-hosts/teams/dynamic config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigAuditRow {
    pub actor: String,
    pub operation: ConfigOperation,
    pub table_name: String,
    pub record_id: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub reason: Option<String>,
    pub correlation_id: Option<String>,
}
