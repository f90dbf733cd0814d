//! Transactional writes for rules/dev-hosts/teams: the write and its
//! config-audit row share one `sqlx` transaction, so a crash between the
//! two is not observable — either both land or neither does.

use chrono::Utc;
use mutt_types::{ConfigAuditRow, ConfigOperation, DevHandling, Handling, MatchSpec, MatchTypeTag, Rule, RuleValidationError};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::error::AdminError;

#[derive(Debug, Clone, Serialize)]
pub struct RuleView {
    pub id: i64,
    pub match_type: MatchTypeTag,
    pub match_value: String,
    pub priority: u16,
    pub prod_handling: Handling,
    pub dev_handling: DevHandling,
    pub team_assignment: String,
    pub is_active: bool,
}

impl From<Rule> for RuleView {
    fn from(rule: Rule) -> Self {
        let match_type = rule.r#match.tag();
        let match_value = match &rule.r#match {
            MatchSpec::Contains(v) | MatchSpec::OidPrefix(v) => v.clone(),
            MatchSpec::Regex { pattern, .. } => pattern.clone(),
        };
        RuleView {
            id: rule.id,
            match_type,
            match_value,
            priority: rule.priority,
            prod_handling: rule.prod_handling,
            dev_handling: rule.dev_handling,
            team_assignment: rule.team_assignment,
            is_active: rule.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuleInput {
    pub match_type: MatchTypeTag,
    pub match_value: String,
    pub priority: u16,
    pub prod_handling: Handling,
    pub dev_handling: DevHandling,
    pub team_assignment: String,
}

impl RuleInput {
    pub fn into_rule(self, id: i64) -> Result<Rule, RuleValidationError> {
        let r#match = MatchSpec::from_tagged(self.match_type, &self.match_value)?;
        let rule = Rule {
            id,
            r#match,
            priority: self.priority,
            prod_handling: self.prod_handling,
            dev_handling: self.dev_handling,
            team_assignment: self.team_assignment,
            is_active: true,
        };
        rule.validate()?;
        Ok(rule)
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
    fn into_rule(self) -> Result<Rule, RuleValidationError> {
        let tag: MatchTypeTag = match self.match_type.as_str() {
            "contains" => MatchTypeTag::Contains,
            "regex" => MatchTypeTag::Regex,
            "oid_prefix" => MatchTypeTag::OidPrefix,
            _ => return Err(RuleValidationError::InvalidRegex("unknown match_type".to_string())),
        };
        let r#match = MatchSpec::from_tagged(tag, &self.match_value)?;
        let prod_handling = match self.prod_handling.as_str() {
            "page_and_ticket" => Handling::PageAndTicket,
            "ticket_only" => Handling::TicketOnly,
            "email_only" => Handling::EmailOnly,
            _ => Handling::LogOnly,
        };
        let dev_handling = match self.dev_handling.as_str() {
            "ticket_only" => DevHandling::TicketOnly,
            "email_only" => DevHandling::EmailOnly,
            "suppress" => DevHandling::Suppress,
            _ => DevHandling::LogOnly,
        };
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

const RULE_COLUMNS: &str = "id, match_type, match_value, priority, prod_handling, dev_handling, team_assignment, is_active";

pub async fn list_rules(pool: &PgPool) -> Result<Vec<RuleView>, AdminError> {
    let rows: Vec<RuleRow> = sqlx::query_as(&format!("SELECT {RULE_COLUMNS} FROM alert_rules ORDER BY priority DESC, id ASC"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(|r| Ok(r.into_rule()?.into())).collect()
}

pub async fn get_rule(pool: &PgPool, id: i64) -> Result<Option<RuleView>, AdminError> {
    let row: Option<RuleRow> = sqlx::query_as(&format!("SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| Ok(r.into_rule()?.into())).transpose()
}

pub async fn create_rule(
    tx: &mut Transaction<'_, Postgres>,
    input: Rule,
    actor: &str,
    reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<RuleView, AdminError> {
    let row: RuleRow = sqlx::query_as(&format!(
        "INSERT INTO alert_rules (match_type, match_value, priority, prod_handling, dev_handling, team_assignment, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, TRUE)
         RETURNING {RULE_COLUMNS}"
    ))
    .bind(match_type_str(input.r#match.tag()))
    .bind(match_value_of(&input.r#match))
    .bind(input.priority as i16)
    .bind(handling_str(input.prod_handling))
    .bind(dev_handling_str(input.dev_handling))
    .bind(&input.team_assignment)
    .fetch_one(&mut **tx)
    .await?;
    let view: RuleView = row.into_rule()?.into();

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Create,
            table_name: "alert_rules".to_string(),
            record_id: view.id.to_string(),
            old_value: None,
            new_value: Some(serde_json::to_value(&view).unwrap_or_default()),
            reason,
            correlation_id,
        },
    )
    .await?;

    Ok(view)
}

pub async fn update_rule(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    input: Rule,
    actor: &str,
    reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<RuleView, AdminError> {
    let before_row: Option<RuleRow> = sqlx::query_as(&format!("SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    let before: Option<RuleView> = before_row.map(|r| r.into_rule().map(Into::into)).transpose()?;

    let row: RuleRow = sqlx::query_as(&format!(
        "UPDATE alert_rules
         SET match_type = $2, match_value = $3, priority = $4, prod_handling = $5,
             dev_handling = $6, team_assignment = $7, updated_at = now()
         WHERE id = $1
         RETURNING {RULE_COLUMNS}"
    ))
    .bind(id)
    .bind(match_type_str(input.r#match.tag()))
    .bind(match_value_of(&input.r#match))
    .bind(input.priority as i16)
    .bind(handling_str(input.prod_handling))
    .bind(dev_handling_str(input.dev_handling))
    .bind(&input.team_assignment)
    .fetch_one(&mut **tx)
    .await?;
    let view: RuleView = row.into_rule()?.into();

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Update,
            table_name: "alert_rules".to_string(),
            record_id: view.id.to_string(),
            old_value: before.map(|b| serde_json::to_value(&b).unwrap_or_default()),
            new_value: Some(serde_json::to_value(&view).unwrap_or_default()),
            reason,
            correlation_id,
        },
    )
    .await?;

    Ok(view)
}

pub async fn deactivate_rule(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    actor: &str,
    reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<(), AdminError> {
    if id == mutt_types::DEFAULT_RULE_ID {
        return Err(AdminError::DefaultRuleProtected);
    }

    let is_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM alert_rules WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    match is_active {
        None => return Err(AdminError::NotFound),
        Some(false) => return Ok(()),
        Some(true) => {}
    }

    sqlx::query("UPDATE alert_rules SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Delete,
            table_name: "alert_rules".to_string(),
            record_id: id.to_string(),
            old_value: None,
            new_value: None,
            reason,
            correlation_id,
        },
    )
    .await?;

    Ok(())
}

fn match_value_of(m: &MatchSpec) -> &str {
    match m {
        MatchSpec::Contains(v) | MatchSpec::OidPrefix(v) => v,
        MatchSpec::Regex { pattern, .. } => pattern,
    }
}

pub async fn write_config_audit(tx: &mut Transaction<'_, Postgres>, row: ConfigAuditRow) -> Result<(), AdminError> {
    let operation = match row.operation {
        ConfigOperation::Create => "create",
        ConfigOperation::Update => "update",
        ConfigOperation::Delete => "delete",
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
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DevHostView {
    pub hostname: String,
    pub reason: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

pub async fn list_dev_hosts(pool: &PgPool) -> Result<Vec<DevHostView>, AdminError> {
    let rows = sqlx::query_as::<_, DevHostView>("SELECT hostname, reason, created_at FROM development_hosts ORDER BY hostname")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn add_dev_host(
    tx: &mut Transaction<'_, Postgres>,
    hostname: &str,
    reason: Option<&str>,
    actor: &str,
    audit_reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<DevHostView, AdminError> {
    let row: DevHostView = sqlx::query_as(
        "INSERT INTO development_hosts (hostname, reason) VALUES ($1, $2)
         ON CONFLICT (hostname) DO UPDATE SET reason = EXCLUDED.reason
         RETURNING hostname, reason, created_at",
    )
    .bind(hostname)
    .bind(reason)
    .fetch_one(&mut **tx)
    .await?;

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Create,
            table_name: "development_hosts".to_string(),
            record_id: hostname.to_string(),
            old_value: None,
            new_value: Some(serde_json::to_value(&row).unwrap_or_default()),
            reason: audit_reason,
            correlation_id,
        },
    )
    .await?;

    Ok(row)
}

pub async fn remove_dev_host(
    tx: &mut Transaction<'_, Postgres>,
    hostname: &str,
    actor: &str,
    audit_reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<(), AdminError> {
    sqlx::query("DELETE FROM development_hosts WHERE hostname = $1")
        .bind(hostname)
        .execute(&mut **tx)
        .await?;

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Delete,
            table_name: "development_hosts".to_string(),
            record_id: hostname.to_string(),
            old_value: None,
            new_value: None,
            reason: audit_reason,
            correlation_id,
        },
    )
    .await?;

    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DeviceTeamView {
    pub id: i64,
    pub device_pattern: String,
    pub team: String,
    pub created_at: chrono::DateTime<Utc>,
}

pub async fn list_device_teams(pool: &PgPool) -> Result<Vec<DeviceTeamView>, AdminError> {
    let rows = sqlx::query_as::<_, DeviceTeamView>("SELECT id, device_pattern, team, created_at FROM device_teams ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn add_device_team(
    tx: &mut Transaction<'_, Postgres>,
    device_pattern: &str,
    team: &str,
    actor: &str,
    reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<DeviceTeamView, AdminError> {
    let row: DeviceTeamView = sqlx::query_as(
        "INSERT INTO device_teams (device_pattern, team) VALUES ($1, $2) RETURNING id, device_pattern, team, created_at",
    )
    .bind(device_pattern)
    .bind(team)
    .fetch_one(&mut **tx)
    .await?;

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Create,
            table_name: "device_teams".to_string(),
            record_id: row.id.to_string(),
            old_value: None,
            new_value: Some(serde_json::to_value(&row).unwrap_or_default()),
            reason,
            correlation_id,
        },
    )
    .await?;

    Ok(row)
}

pub async fn update_device_team(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    team: &str,
    actor: &str,
    reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<DeviceTeamView, AdminError> {
    let row: DeviceTeamView = sqlx::query_as(
        "UPDATE device_teams SET team = $2 WHERE id = $1 RETURNING id, device_pattern, team, created_at",
    )
    .bind(id)
    .bind(team)
    .fetch_one(&mut **tx)
    .await?;

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Update,
            table_name: "device_teams".to_string(),
            record_id: id.to_string(),
            old_value: None,
            new_value: Some(serde_json::to_value(&row).unwrap_or_default()),
            reason,
            correlation_id,
        },
    )
    .await?;

    Ok(row)
}

pub async fn remove_device_team(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    actor: &str,
    reason: Option<String>,
    correlation_id: Option<String>,
) -> Result<(), AdminError> {
    sqlx::query("DELETE FROM device_teams WHERE id = $1").bind(id).execute(&mut **tx).await?;

    write_config_audit(
        tx,
        ConfigAuditRow {
            actor: actor.to_string(),
            operation: ConfigOperation::Delete,
            table_name: "device_teams".to_string(),
            record_id: id.to_string(),
            old_value: None,
            new_value: None,
            reason,
            correlation_id,
        },
    )
    .await?;

    Ok(())
}
