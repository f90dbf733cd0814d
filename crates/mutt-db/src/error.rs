#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("the default rule (id 0) cannot be deleted or deactivated")]
    DefaultRuleProtected,

    #[error("rule validation failed: {0}")]
    RuleValidation(#[from] mutt_types::RuleValidationError),
}

pub type DbResult<T> = Result<T, DbError>;
