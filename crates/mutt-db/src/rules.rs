//! Classification rule storage. The default rule (id 0) is seeded by the
//! `0001_init.sql` migration and is protected here, not just by
//! convention, from deletion or deactivation.

use mutt_types::{DevHandling, Handling, MatchSpec, MatchTypeTag, Rule, DEFAULT_RULE_ID};
use sqlx::{FromRow, PgPool};

use crate::error::{DbError, DbResult};

#[derive(FromRow)]
struct RuleRow {
    id: i64,
    match_type: String,
    match_value: String,
    priority: i16,
    prod_handling: String,
    dev_handling: String,
    team_assignment: String,
    is_active: bool,
}

impl RuleRow {
    fn into_rule(self) -> DbResult<Rule> {
        let tag: MatchTypeTag = serde_json::from_value(serde_json::Value::String(self.match_type))
            .map_err(|_| DbError::RuleValidation(mutt_types::RuleValidationError::InvalidRegex("unknown match_type".to_string())))?;
        let r#match = MatchSpec::from_tagged(tag, &self.match_value)?;
        let prod_handling: Handling = serde_json::from_value(serde_json::Value::String(self.prod_handling))
            .map_err(|_| DbError::RuleValidation(mutt_types::RuleValidationError::PriorityOutOfRange))?;
        let dev_handling: DevHandling = serde_json::from_value(serde_json::Value::String(self.dev_handling))
            .map_err(|_| DbError::RuleValidation(mutt_types::RuleValidationError::PriorityOutOfRange))?;
        Ok(Rule {
            id: self.id,
            r#match,
            priority: self.priority as u16,
            prod_handling,
            dev_handling,
            team_assignment: self.team_assignment,
            is_active: self.is_active,
        })
    }
}

fn handling_str(h: Handling) -> &'static str {
    match h {
        Handling::PageAndTicket => "page_and_ticket",
        Handling::TicketOnly => "ticket_only",
        Handling::EmailOnly => "email_only",
        Handling::LogOnly => "log_only",
    }
}

fn dev_handling_str(h: DevHandling) -> &'static str {
    match h {
        DevHandling::TicketOnly => "ticket_only",
        DevHandling::EmailOnly => "email_only",
        DevHandling::LogOnly => "log_only",
        DevHandling::Suppress => "suppress",
    }
}

fn match_type_str(tag: MatchTypeTag) -> &'static str {
    match tag {
        MatchTypeTag::Contains => "contains",
        MatchTypeTag::Regex => "regex",
        MatchTypeTag::OidPrefix => "oid_prefix",
    }
}

fn match_value_str(r#match: &MatchSpec) -> &str {
    match r#match {
        MatchSpec::Contains(v) | MatchSpec::OidPrefix(v) => v,
        MatchSpec::Regex { pattern, .. } => pattern,
    }
}

const RULE_COLUMNS: &str =
    "id, match_type, match_value, priority, prod_handling, dev_handling, team_assignment, is_active";

/// All active rules, used to rebuild the Classifier's in-memory cache.
pub async fn list_active_rules(pool: &PgPool) -> DbResult<Vec<Rule>> {
    let rows: Vec<RuleRow> = sqlx::query_as(&format!(
        "SELECT {RULE_COLUMNS} FROM alert_rules WHERE is_active = TRUE"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(RuleRow::into_rule).collect()
}

pub async fn get_rule(pool: &PgPool, id: i64) -> DbResult<Option<Rule>> {
    let row: Option<RuleRow> = sqlx::query_as(&format!(
        "SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(RuleRow::into_rule).transpose()
}

pub async fn create_rule(pool: &PgPool, rule: &Rule) -> DbResult<Rule> {
    rule.validate()?;
    let row: RuleRow = sqlx::query_as(&format!(
        "INSERT INTO alert_rules (match_type, match_value, priority, prod_handling, dev_handling, team_assignment, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, TRUE)
         RETURNING {RULE_COLUMNS}"
    ))
    .bind(match_type_str(rule.r#match.tag()))
    .bind(match_value_str(&rule.r#match))
    .bind(rule.priority as i16)
    .bind(handling_str(rule.prod_handling))
    .bind(dev_handling_str(rule.dev_handling))
    .bind(&rule.team_assignment)
    .fetch_one(pool)
    .await?;
    row.into_rule()
}

pub async fn update_rule(pool: &PgPool, id: i64, rule: &Rule) -> DbResult<Rule> {
    rule.validate()?;
    let row: RuleRow = sqlx::query_as(&format!(
        "UPDATE alert_rules
         SET match_type = $2, match_value = $3, priority = $4, prod_handling = $5,
             dev_handling = $6, team_assignment = $7, updated_at = now()
         WHERE id = $1
         RETURNING {RULE_COLUMNS}"
    ))
    .bind(id)
    .bind(match_type_str(rule.r#match.tag()))
    .bind(match_value_str(&rule.r#match))
    .bind(rule.priority as i16)
    .bind(handling_str(rule.prod_handling))
    .bind(dev_handling_str(rule.dev_handling))
    .bind(&rule.team_assignment)
    .fetch_one(pool)
    .await?;
    row.into_rule()
}

/// Soft-delete: `is_active = FALSE`. Rows are kept for audit history, so
/// this is a flag flip, not a `DELETE`.
pub async fn deactivate_rule(pool: &PgPool, id: i64) -> DbResult<()> {
    if id == DEFAULT_RULE_ID {
        return Err(DbError::DefaultRuleProtected);
    }
    sqlx::query("UPDATE alert_rules SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
