use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("rule validation failed: {0}")]
    RuleValidation(#[from] mutt_types::RuleValidationError),

    #[error("the default rule (id 0) cannot be deleted or deactivated")]
    DefaultRuleProtected,

    #[error("not found")]
    NotFound,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AdminError::RuleValidation(_) | AdminError::DefaultRuleProtected => StatusCode::BAD_REQUEST,
            AdminError::NotFound => StatusCode::NOT_FOUND,
            AdminError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "status": "rejected", "reason": self.to_string() }))).into_response()
    }
}
