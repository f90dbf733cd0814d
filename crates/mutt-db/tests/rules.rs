//! Exercises the rule store against a real Postgres instance. Requires
//! `DATABASE_URL` to point at a database with migrations applied; skipped
//! otherwise so `cargo test` stays usable without a local Postgres.

use mutt_types::{DevHandling, Handling, MatchSpec, Rule};

async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = mutt_db::connect(&url, 5).await.ok()?;
    mutt_db::run_migrations(&pool).await.ok()?;
    Some(pool)
}

fn sample_rule() -> Rule {
    Rule {
        id: 0,
        r#match: MatchSpec::Contains("disk full".to_string()),
        priority: 500,
        prod_handling: Handling::PageAndTicket,
        dev_handling: DevHandling::Suppress,
        team_assignment: "storage".to_string(),
        is_active: true,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn create_then_list_round_trips() {
    let Some(pool) = test_pool().await else { return };
    let created = mutt_db::create_rule(&pool, &sample_rule()).await.expect("create");
    assert_ne!(created.id, 0);

    let rules = mutt_db::list_active_rules(&pool).await.expect("list");
    assert!(rules.iter().any(|r| r.id == created.id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn default_rule_cannot_be_deactivated() {
    let Some(pool) = test_pool().await else { return };
    let result = mutt_db::deactivate_rule(&pool, 0).await;
    assert!(matches!(result, Err(mutt_db::DbError::DefaultRuleProtected)));
}
