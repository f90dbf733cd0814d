//! Secrets broker client.
//!
//! Every credential MUTT services hold — the Ingestor's accepted API
//! keys, the webhook signing key, the Admin API's keys, the database
//! password — rotates through a CURRENT/NEXT pair rather than a single
//! value, so a rotation in the broker can roll out to a fleet of
//! instances without a moment where some instances reject the new value
//! and others reject the old one. Both slots are accepted until the
//! broker retires the old CURRENT.
//!
//! Resolution checks, in order:
//! 1. `MUTT_SECRET_<NAME>` / `MUTT_SECRET_<NAME>_NEXT` environment variables
//! 2. A secrets file (`[secrets.<name>] current`/`next`)
//!
//! # Example
//!
//! ```
//! use mutt_secrets::resolve_secret;
//!
//! let material = resolve_secret("moog_api_key", None);
//! assert!(!material.detected);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use subtle::ConstantTimeEq;

/// Environment variable prefix for a secret's current value.
pub const ENV_PREFIX: &str = "MUTT_SECRET_";
/// Default secrets file name, resolved relative to `$MUTT_SECRETS_DIR`.
pub const SECRETS_FILE: &str = "secrets.toml";

/// Where a [`SecretMaterial`] was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOrigin {
    None,
    Env,
    File,
}

/// A secret's current and (if a rotation is in progress) next value.
#[derive(Debug, Clone, Default)]
pub struct SecretMaterial {
    pub current: Option<String>,
    pub next: Option<String>,
    pub origin: SecretOriginRecord,
    pub detected: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecretOriginRecord(pub Option<SecretOrigin>);

impl SecretMaterial {
    /// Constant-time comparison against both accepted slots — callers
    /// must never short-circuit on slot order, since during a rotation
    /// either value is equally valid.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.as_bytes();
        [&self.current, &self.next].into_iter().flatten().any(|accepted| {
            let accepted = accepted.as_bytes();
            accepted.len() == candidate.len() && bool::from(accepted.ct_eq(candidate))
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("failed to read secrets file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse secrets file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

/// Resolve a single named secret's current/next material.
pub fn resolve_secret(name: &str, secrets_dir: Option<&Path>) -> SecretMaterial {
    let env_name = format!("{ENV_PREFIX}{}", name.to_uppercase());
    let current = std::env::var(&env_name).ok().filter(|v| !v.is_empty());
    let next = std::env::var(format!("{env_name}_NEXT")).ok().filter(|v| !v.is_empty());

    if current.is_some() || next.is_some() {
        return SecretMaterial {
            detected: true,
            origin: SecretOriginRecord(Some(SecretOrigin::Env)),
            current,
            next,
        };
    }

    if let Ok(Some(material)) = secret_from_file(name, secrets_dir) {
        return material;
    }

    SecretMaterial::default()
}

fn secret_from_file(name: &str, secrets_dir: Option<&Path>) -> Result<Option<SecretMaterial>, SecretsError> {
    let dir = secrets_dir_path(secrets_dir);
    let path = dir.join(SECRETS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|source| SecretsError::Read { path: path.clone(), source })?;
    let parsed: toml::Value = toml::from_str(&content).map_err(|source| SecretsError::Parse { path, source })?;

    let Some(entry) = parsed.get("secrets").and_then(|s| s.get(name)) else {
        return Ok(None);
    };
    let current = entry.get("current").and_then(|v| v.as_str()).map(str::to_string);
    let next = entry.get("next").and_then(|v| v.as_str()).map(str::to_string);
    if current.is_none() && next.is_none() {
        return Ok(None);
    }
    Ok(Some(SecretMaterial {
        current,
        next,
        origin: SecretOriginRecord(Some(SecretOrigin::File)),
        detected: true,
    }))
}

fn secrets_dir_path(secrets_dir: Option<&Path>) -> PathBuf {
    if let Some(path) = secrets_dir {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("MUTT_SECRETS_DIR") {
        return PathBuf::from(path);
    }
    PathBuf::from("/etc/mutt/secrets")
}

/// Holds live, hot-swappable material for a fixed set of named secrets,
/// refreshed on an interval by a background task.
pub struct SecretsClient {
    materials: HashMap<String, Arc<ArcSwap<SecretMaterial>>>,
    secrets_dir: Option<PathBuf>,
}

impl SecretsClient {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>, secrets_dir: Option<PathBuf>) -> Self {
        let materials = names
            .into_iter()
            .map(|n| {
                let name = n.into();
                let material = resolve_secret(&name, secrets_dir.as_deref());
                (name, Arc::new(ArcSwap::from_pointee(material)))
            })
            .collect();
        Self { materials, secrets_dir }
    }

    /// Current snapshot for `name`. Returns a default (empty, not
    /// detected) material for a name this client wasn't constructed with,
    /// rather than panicking — callers treat that the same as "no secret
    /// configured yet".
    pub fn get(&self, name: &str) -> Arc<SecretMaterial> {
        self.materials
            .get(name)
            .map(|cell| cell.load_full())
            .unwrap_or_else(|| Arc::new(SecretMaterial::default()))
    }

    pub fn matches(&self, name: &str, candidate: &str) -> bool {
        self.get(name).matches(candidate)
    }

    fn refresh_once(&self) {
        for (name, cell) in &self.materials {
            let fresh = resolve_secret(name, self.secrets_dir.as_deref());
            cell.store(Arc::new(fresh));
        }
    }

    /// Spawn the background renewal loop. The returned handle should be
    /// held for the lifetime of the service; dropping it does not abort
    /// the task (use `JoinHandle::abort` explicitly on shutdown).
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.refresh_once();
                tracing::debug!("secrets refreshed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_accepts_current_and_next() {
        let material = SecretMaterial {
            current: Some("abc123".to_string()),
            next: Some("def456".to_string()),
            origin: SecretOriginRecord(Some(SecretOrigin::Env)),
            detected: true,
        };
        assert!(material.matches("abc123"));
        assert!(material.matches("def456"));
        assert!(!material.matches("garbage"));
    }

    #[test]
    fn matches_rejects_empty_when_no_slots_set() {
        let material = SecretMaterial::default();
        assert!(!material.matches(""));
        assert!(!material.matches("anything"));
    }

    #[test]
    fn resolve_from_env_takes_precedence_over_file() {
        temp_env::with_var("MUTT_SECRET_MOOG_API_KEY", Some("envvalue"), || {
            let material = resolve_secret("moog_api_key", None);
            assert!(material.detected);
            assert_eq!(material.current, Some("envvalue".to_string()));
            assert_eq!(material.origin, SecretOriginRecord(Some(SecretOrigin::Env)));
        });
    }

    #[test]
    fn resolve_from_file_when_env_absent() {
        let td = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            td.path().join(SECRETS_FILE),
            r#"
[secrets.moog_api_key]
current = "filevalue"
next = "filenextvalue"
"#,
        )
        .expect("write");

        temp_env::with_vars(
            [
                ("MUTT_SECRET_MOOG_API_KEY", None::<String>),
                ("MUTT_SECRET_MOOG_API_KEY_NEXT", None::<String>),
            ],
            || {
                let material = resolve_secret("moog_api_key", Some(td.path()));
                assert!(material.detected);
                assert_eq!(material.current, Some("filevalue".to_string()));
                assert_eq!(material.next, Some("filenextvalue".to_string()));
            },
        );
    }

    #[test]
    fn client_get_returns_default_for_unknown_name() {
        let client = SecretsClient::new(Vec::<String>::new(), None);
        let material = client.get("nonexistent");
        assert!(!material.detected);
    }
}
