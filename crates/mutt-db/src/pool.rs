use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbResult;

pub async fn connect(database_url: &str, max_connections: u32) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the bundled migrations. Safe to call on every service start;
/// `sqlx::migrate!` tracks what has already been applied.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| crate::error::DbError::Sqlx(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(())
}
