//! Development-host registry: hostnames exempted from production
//! handling, routed through `dev_handling` instead of `prod_handling`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::DbResult;

#[derive(Debug, Clone, FromRow)]
pub struct DevelopmentHost {
    pub hostname: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn list_dev_hosts(pool: &PgPool) -> DbResult<Vec<DevelopmentHost>> {
    let rows = sqlx::query_as::<_, DevelopmentHost>("SELECT hostname, reason, created_at FROM development_hosts")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn add_dev_host(pool: &PgPool, hostname: &str, reason: Option<&str>) -> DbResult<DevelopmentHost> {
    let row = sqlx::query_as::<_, DevelopmentHost>(
        "INSERT INTO development_hosts (hostname, reason) VALUES ($1, $2)
         ON CONFLICT (hostname) DO UPDATE SET reason = EXCLUDED.reason
         RETURNING hostname, reason, created_at",
    )
    .bind(hostname)
    .bind(reason)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn remove_dev_host(pool: &PgPool, hostname: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM development_hosts WHERE hostname = $1")
        .bind(hostname)
        .execute(pool)
        .await?;
    Ok(())
}
