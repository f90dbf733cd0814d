//! Append-only audit writes: one event row per classified event, one
//! config row per write to rules/dev-hosts/teams/dynamic config.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use mutt_types::{ConfigAuditRow, EventAuditRow};
use sqlx::PgPool;

use crate::error::DbResult;

pub async fn insert_event_audit(pool: &PgPool, row: &EventAuditRow) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO event_audit_log (event_time, hostname, matched_rule_id, handling, forwarded, correlation_id, raw_event)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(row.event_time)
    .bind(&row.hostname)
    .bind(row.matched_rule_id)
    .bind(&row.handling)
    .bind(row.forwarded)
    .bind(&row.correlation_id)
    .bind(&row.raw_event)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_config_audit(pool: &PgPool, row: &ConfigAuditRow) -> DbResult<()> {
    let operation = match row.operation {
        mutt_types::ConfigOperation::Create => "create",
        mutt_types::ConfigOperation::Update => "update",
        mutt_types::ConfigOperation::Delete => "delete",
    };
    sqlx::query(
        "INSERT INTO config_audit_log (actor, operation, table_name, record_id, old_value, new_value, reason, correlation_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&row.actor)
    .bind(operation)
    .bind(&row.table_name)
    .bind(&row.record_id)
    .bind(&row.old_value)
    .bind(&row.new_value)
    .bind(&row.reason)
    .bind(&row.correlation_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn audit_logs_for_host(pool: &PgPool, hostname: &str, limit: i64) -> DbResult<Vec<EventAuditRow>> {
    let rows = sqlx::query_as::<_, EventAuditRowSql>(
        "SELECT event_time, hostname, matched_rule_id, handling, forwarded, correlation_id, raw_event
         FROM event_audit_log WHERE hostname = $1 ORDER BY event_time DESC LIMIT $2",
    )
    .bind(hostname)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(sqlx::FromRow)]
struct EventAuditRowSql {
    event_time: DateTime<Utc>,
    hostname: String,
    matched_rule_id: Option<i64>,
    handling: String,
    forwarded: bool,
    correlation_id: Option<String>,
    raw_event: serde_json::Value,
}

impl From<EventAuditRowSql> for EventAuditRow {
    fn from(row: EventAuditRowSql) -> Self {
        EventAuditRow {
            event_time: row.event_time,
            hostname: row.hostname,
            matched_rule_id: row.matched_rule_id,
            handling: row.handling,
            forwarded: row.forwarded,
            correlation_id: row.correlation_id,
            raw_event: row.raw_event,
        }
    }
}

/// Ensure the monthly partition covering `for_time` exists. Idempotent —
/// safe to call on every service start or on a daily timer, since
/// `CREATE TABLE IF NOT EXISTS` is itself idempotent.
pub async fn ensure_partition_for(pool: &PgPool, for_time: DateTime<Utc>) -> DbResult<()> {
    let start = Utc.with_ymd_and_hms(for_time.year(), for_time.month(), 1, 0, 0, 0).unwrap();
    let end = if for_time.month() == 12 {
        Utc.with_ymd_and_hms(for_time.year() + 1, 1, 1, 0, 0, 0).unwrap()
    } else {
        Utc.with_ymd_and_hms(for_time.year(), for_time.month() + 1, 1, 0, 0, 0).unwrap()
    };
    let table_name = format!("event_audit_log_{:04}_{:02}", for_time.year(), for_time.month());

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {table_name} PARTITION OF event_audit_log FOR VALUES FROM ('{}') TO ('{}')",
        start.to_rfc3339(),
        end.to_rfc3339(),
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}
