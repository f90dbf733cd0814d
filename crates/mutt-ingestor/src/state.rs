use std::sync::Arc;

use mutt_config::{DynamicConfigClient, IngestorConfig};
use mutt_queue::QueueClient;
use mutt_secrets::SecretsClient;

/// Name the Ingestor's accepted API key is resolved under in
/// `mutt-secrets` (env `MUTT_SECRET_INGEST_API_KEY[_NEXT]`, or
/// `[secrets.ingest_api_key]` in the secrets file).
pub const INGEST_API_KEY_NAME: &str = "ingest_api_key";

#[derive(Clone)]
pub struct AppState {
    pub queue: QueueClient,
    pub secrets: Arc<SecretsClient>,
    pub dynamic_config: Arc<DynamicConfigClient>,
    pub static_config: IngestorConfig,
}
