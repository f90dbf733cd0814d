//! `GET /api/v2/audit-logs` — a thin, filterable read over
//! `config_audit_log`. The exact filter/pagination contract is left open
//! by design (see the config-audit read-path open question); this
//! implements the filters `spec.md` names: table name, operation, actor,
//! and a date range, plus limit/offset pagination.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::authenticated;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub table_name: Option<String>,
    pub operation: Option<String>,
    pub changed_by: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize, FromRow)]
pub struct ConfigAuditEntry {
    pub id: i64,
    pub actor: String,
    pub operation: String,
    pub table_name: String,
    pub record_id: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn list(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<AuditQuery>) -> impl IntoResponse {
    if !authenticated(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let limit = query.limit.clamp(1, 1000);
    let rows = sqlx::query_as::<_, ConfigAuditEntry>(
        "SELECT id, actor, operation, table_name, record_id, old_value, new_value, reason, correlation_id, created_at
         FROM config_audit_log
         WHERE ($1::text IS NULL OR table_name = $1)
           AND ($2::text IS NULL OR operation = $2)
           AND ($3::text IS NULL OR actor = $3)
           AND ($4::timestamptz IS NULL OR created_at >= $4)
           AND ($5::timestamptz IS NULL OR created_at <= $5)
         ORDER BY created_at DESC
         LIMIT $6 OFFSET $7",
    )
    .bind(&query.table_name)
    .bind(&query.operation)
    .bind(&query.changed_by)
    .bind(query.since)
    .bind(query.until)
    .bind(limit)
    .bind(query.offset)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => Json(rows).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to query config audit log");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
