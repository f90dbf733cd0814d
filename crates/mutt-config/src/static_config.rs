//! Static, process-start configuration: the tunables every service reads
//! once from its environment and an optional TOML file, as opposed to the
//! tunables in [`crate::dynamic`] that can change without a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = ".mutt.toml";
const ENV_PREFIX: &str = "MUTT_";

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// The full static configuration tree. Every service constructs the whole
/// thing and reads only the sections it needs — a shared shape keeps the
/// admin API's view of "what is configured" consistent across services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub substrate: SubstrateConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingestor: IngestorConfig,
    #[serde(default)]
    pub alerter: AlerterConfig,
    #[serde(default)]
    pub deliverer: DelivererConfig,
    #[serde(default)]
    pub remediator: RemediatorConfig,
    #[serde(default)]
    pub admin_api: AdminApiConfig,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            substrate: SubstrateConfig::default(),
            database: DatabaseConfig::default(),
            ingestor: IngestorConfig::default(),
            alerter: AlerterConfig::default(),
            deliverer: DelivererConfig::default(),
            remediator: RemediatorConfig::default(),
            admin_api: AdminApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateConfig {
    #[serde(default = "default_substrate_url")]
    pub url: String,
}
fn default_substrate_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
impl Default for SubstrateConfig {
    fn default() -> Self {
        Self { url: default_substrate_url() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}
fn default_database_url() -> String {
    "postgres://mutt@127.0.0.1/mutt".to_string()
}
fn default_pool_size() -> u32 {
    10
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url(), max_connections: default_pool_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestorConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// `-1` disables admission control entirely (the ingest endpoint never
    /// returns 503 for queue depth); any non-negative value is the cap.
    #[serde(default = "default_max_ingest_queue_size")]
    pub max_ingest_queue_size: i64,
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_max_ingest_queue_size() -> i64 {
    100_000
}
impl Default for IngestorConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), max_ingest_queue_size: default_max_ingest_queue_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlerterConfig {
    #[serde(default = "default_alerter_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_cache_reload_interval", with = "humantime_serde")]
    pub cache_reload_interval: Duration,
    #[serde(default = "default_alerter_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: u64,
    #[serde(default = "default_shed_threshold")]
    pub shed_threshold: u64,
    #[serde(default = "default_defer_sleep", with = "humantime_serde")]
    pub defer_sleep: Duration,
    #[serde(default = "default_janitor_interval", with = "humantime_serde")]
    pub janitor_interval: Duration,
}
fn default_alerter_bind_addr() -> String {
    "0.0.0.0:8081".to_string()
}
fn default_cache_reload_interval() -> Duration {
    Duration::from_secs(30)
}
fn default_alerter_max_retries() -> u32 {
    3
}
fn default_warn_threshold() -> u64 {
    1_000
}
fn default_shed_threshold() -> u64 {
    2_000
}
fn default_defer_sleep() -> Duration {
    Duration::from_millis(250)
}
fn default_janitor_interval() -> Duration {
    Duration::from_secs(30)
}
impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_alerter_bind_addr(),
            cache_reload_interval: default_cache_reload_interval(),
            max_retries: default_alerter_max_retries(),
            warn_threshold: default_warn_threshold(),
            shed_threshold: default_shed_threshold(),
            defer_sleep: default_defer_sleep(),
            janitor_interval: default_janitor_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelivererConfig {
    #[serde(default = "default_deliverer_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_moog_webhook_url")]
    pub moog_webhook_url: String,
    #[serde(default = "default_moog_webhook_timeout", with = "humantime_serde")]
    pub moog_webhook_timeout: Duration,
    #[serde(default = "default_moog_max_retries")]
    pub moog_max_retries: u32,
    #[serde(default = "default_moog_max_inflight")]
    pub moog_max_inflight: usize,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_open_duration", with = "humantime_serde")]
    pub breaker_open_duration: Duration,
    #[serde(default = "default_rate_limit_window", with = "humantime_serde")]
    pub rate_limit_window: Duration,
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,
    #[serde(default = "default_janitor_interval", with = "humantime_serde")]
    pub janitor_interval: Duration,
}
fn default_deliverer_bind_addr() -> String {
    "0.0.0.0:8082".to_string()
}
fn default_moog_webhook_url() -> String {
    "http://127.0.0.1:9090/alerts".to_string()
}
fn default_moog_webhook_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_moog_max_retries() -> u32 {
    5
}
fn default_moog_max_inflight() -> usize {
    32
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_open_duration() -> Duration {
    Duration::from_secs(60)
}
fn default_rate_limit_window() -> Duration {
    Duration::from_secs(1)
}
fn default_rate_limit_max_requests() -> u32 {
    50
}
impl Default for DelivererConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_deliverer_bind_addr(),
            moog_webhook_url: default_moog_webhook_url(),
            moog_webhook_timeout: default_moog_webhook_timeout(),
            moog_max_retries: default_moog_max_retries(),
            moog_max_inflight: default_moog_max_inflight(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_open_duration: default_breaker_open_duration(),
            rate_limit_window: default_rate_limit_window(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            janitor_interval: default_janitor_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediatorConfig {
    #[serde(default = "default_remediator_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_remediation_scan_interval", with = "humantime_serde")]
    pub scan_interval: Duration,
    #[serde(default = "default_dlq_batch_size")]
    pub dlq_batch_size: u32,
    #[serde(default = "default_max_remediation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_moog_health_probe_timeout", with = "humantime_serde")]
    pub moog_health_probe_timeout: Duration,
}
fn default_remediator_bind_addr() -> String {
    "0.0.0.0:8083".to_string()
}
fn default_remediation_scan_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_dlq_batch_size() -> u32 {
    100
}
fn default_max_remediation_retries() -> u32 {
    3
}
fn default_moog_health_probe_timeout() -> Duration {
    Duration::from_secs(3)
}
impl Default for RemediatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_remediator_bind_addr(),
            scan_interval: default_remediation_scan_interval(),
            dlq_batch_size: default_dlq_batch_size(),
            max_retries: default_max_remediation_retries(),
            moog_health_probe_timeout: default_moog_health_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminApiConfig {
    #[serde(default = "default_admin_api_bind_addr")]
    pub bind_addr: String,
}
fn default_admin_api_bind_addr() -> String {
    "0.0.0.0:8084".to_string()
}
impl Default for AdminApiConfig {
    fn default() -> Self {
        Self { bind_addr: default_admin_api_bind_addr() }
    }
}

/// Load from `dir`'s `.mutt.toml` if present, then overlay any
/// `MUTT_<SECTION>_<FIELD>` environment variable. Environment always wins
/// — this lets an operator patch one tunable in a container without
/// touching the mounted file.
pub fn load_static_config(dir: &Path) -> Result<StaticConfig, StaticConfigError> {
    let path = config_path(dir);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|source| StaticConfigError::Read { path: path.clone(), source })?;
        toml::from_str(&content).map_err(|source| StaticConfigError::Parse { path, source })?
    } else {
        StaticConfig::default()
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut StaticConfig) {
    if let Ok(url) = std::env::var(format!("{ENV_PREFIX}SUBSTRATE_URL")) {
        config.substrate.url = url;
    }
    if let Ok(url) = std::env::var(format!("{ENV_PREFIX}DATABASE_URL")) {
        config.database.url = url;
    }
    if let Ok(addr) = std::env::var(format!("{ENV_PREFIX}INGESTOR_BIND_ADDR")) {
        config.ingestor.bind_addr = addr;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StaticConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StaticConfig::default();
        assert_eq!(config.alerter.max_retries, 3);
        assert_eq!(config.alerter.warn_threshold, 1_000);
        assert_eq!(config.alerter.shed_threshold, 2_000);
        assert_eq!(config.deliverer.moog_webhook_timeout, Duration::from_secs(10));
        assert_eq!(config.deliverer.moog_max_retries, 5);
        assert_eq!(config.deliverer.breaker_failure_threshold, 5);
        assert_eq!(config.deliverer.breaker_open_duration, Duration::from_secs(60));
        assert_eq!(config.remediator.scan_interval, Duration::from_secs(60));
        assert_eq!(config.remediator.max_retries, 3);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let td = tempfile::tempdir().expect("tempdir");
        let config = load_static_config(td.path()).expect("load");
        assert_eq!(config.alerter.max_retries, 3);
    }

    #[test]
    fn partial_toml_file_fills_remaining_fields_from_defaults() {
        let td = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            config_path(td.path()),
            r#"
[alerter]
max_retries = 7
"#,
        )
        .expect("write");
        let config = load_static_config(td.path()).expect("load");
        assert_eq!(config.alerter.max_retries, 7);
        assert_eq!(config.alerter.warn_threshold, 1_000);
    }

    #[test]
    fn env_override_wins_over_file() {
        let td = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            config_path(td.path()),
            r#"
[ingestor]
bind_addr = "0.0.0.0:9000"
"#,
        )
        .expect("write");
        temp_env::with_var("MUTT_INGESTOR_BIND_ADDR", Some("0.0.0.0:7000"), || {
            let config = load_static_config(td.path()).expect("load");
            assert_eq!(config.ingestor.bind_addr, "0.0.0.0:7000");
        });
    }
}
