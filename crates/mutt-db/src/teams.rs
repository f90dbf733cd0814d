//! Device-to-team mapping: which on-call team owns a given
//! hostname/device pattern, used when a rule leaves `team_assignment`
//! unspecified or the operator wants ownership tracked independently of
//! rule edits.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::DbResult;

#[derive(Debug, Clone, FromRow)]
pub struct DeviceTeam {
    pub id: i64,
    pub device_pattern: String,
    pub team: String,
    pub created_at: DateTime<Utc>,
}

pub async fn list_device_teams(pool: &PgPool) -> DbResult<Vec<DeviceTeam>> {
    let rows = sqlx::query_as::<_, DeviceTeam>(
        "SELECT id, device_pattern, team, created_at FROM device_teams",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn add_device_team(pool: &PgPool, device_pattern: &str, team: &str) -> DbResult<DeviceTeam> {
    let row = sqlx::query_as::<_, DeviceTeam>(
        "INSERT INTO device_teams (device_pattern, team) VALUES ($1, $2)
         RETURNING id, device_pattern, team, created_at",
    )
    .bind(device_pattern)
    .bind(team)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn remove_device_team(pool: &PgPool, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM device_teams WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
