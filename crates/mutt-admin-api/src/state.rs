use std::sync::Arc;

use mutt_queue::QueueClient;
use mutt_secrets::SecretsClient;
use sqlx::PgPool;

pub const ADMIN_API_KEY_NAME: &str = "admin_api_key";

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: QueueClient,
    pub secrets: Arc<SecretsClient>,
}
