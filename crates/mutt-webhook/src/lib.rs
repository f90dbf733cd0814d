//! The Moog webhook client: payload mapping and outcome classification
//! for the Deliverer's single external dependency.
//!
//! # Example
//!
//! ```ignore
//! use mutt_webhook::{MoogAlert, WebhookClient};
//!
//! let client = WebhookClient::new("https://moog.example/alerts", std::time::Duration::from_secs(10));
//! let alert = MoogAlert::new("router-01", "Interface down", 3, "network", "syslog", chrono::Utc::now(), "corr-1");
//! let outcome = client.send(&alert, Some("bearer-token")).await;
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The manager name MUTT always reports itself as in outbound alerts.
pub const MANAGER_NAME: &str = "MUTT";

/// The event, mapped into Moog's expected alert shape. `signature` is not
/// a cryptographic digest — Moog's contract defines it as a copy of
/// `correlation_id`, which is what a receiver actually dedupes on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoogAlert {
    pub source: String,
    pub description: String,
    pub severity: u8,
    pub manager: String,
    pub class: String,
    pub r#type: String,
    pub agent_time: DateTime<Utc>,
    pub correlation_id: String,
    pub signature: String,
}

impl MoogAlert {
    pub fn new(
        source: impl Into<String>,
        description: impl Into<String>,
        severity: u8,
        class: impl Into<String>,
        r#type: impl Into<String>,
        agent_time: DateTime<Utc>,
        correlation_id: impl Into<String>,
    ) -> Self {
        let correlation_id = correlation_id.into();
        Self {
            source: source.into(),
            description: description.into(),
            severity,
            manager: MANAGER_NAME.to_string(),
            class: class.into(),
            r#type: r#type.into(),
            agent_time,
            signature: correlation_id.clone(),
            correlation_id,
        }
    }
}

/// How a delivery attempt resolved, the distinction the Deliverer needs
/// to decide retry-vs-DLQ-vs-just-log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    ClientError(u16),
    ServerError(u16),
    Timeout,
    ConnectionFailed,
}

impl DeliveryOutcome {
    /// Whether the Deliverer should retry this attempt. 4xx responses are
    /// treated as permanent — retrying won't fix a payload Moog rejected.
    pub fn is_retryable(self) -> bool {
        !matches!(self, DeliveryOutcome::Delivered | DeliveryOutcome::ClientError(_))
    }
}

pub struct WebhookClient {
    url: String,
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self { url: url.into(), http }
    }

    /// `bearer_token`, when present, is sent as `Authorization: Bearer
    /// <token>` — the "optional bearer" auth the webhook contract allows
    /// alongside (not instead of) the in-body `signature` field.
    pub async fn send(&self, alert: &MoogAlert, bearer_token: Option<&str>) -> DeliveryOutcome {
        let mut request = self.http.post(&self.url).json(alert);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => return DeliveryOutcome::Timeout,
            Err(error) => {
                tracing::warn!(%error, "moog webhook request failed before a response was received");
                return DeliveryOutcome::ConnectionFailed;
            }
        };

        let status = response.status();
        if status.is_success() {
            DeliveryOutcome::Delivered
        } else if status.is_client_error() {
            DeliveryOutcome::ClientError(status.as_u16())
        } else {
            DeliveryOutcome::ServerError(status.as_u16())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> MoogAlert {
        MoogAlert::new("router-01", "Interface down", 3, "network", "syslog", Utc::now(), "corr-1")
    }

    #[test]
    fn new_alert_reports_mutt_as_manager() {
        let alert = sample_alert();
        assert_eq!(alert.manager, MANAGER_NAME);
        assert_eq!(alert.signature, alert.correlation_id);
    }

    #[test]
    fn signature_tracks_correlation_id() {
        let alert = MoogAlert::new("router-01", "Interface down", 3, "network", "syslog", Utc::now(), "corr-42");
        assert_eq!(alert.signature, "corr-42");
        assert_eq!(alert.correlation_id, "corr-42");
    }

    #[test]
    fn client_errors_are_not_retryable_server_errors_are() {
        assert!(!DeliveryOutcome::ClientError(400).is_retryable());
        assert!(DeliveryOutcome::ServerError(503).is_retryable());
        assert!(DeliveryOutcome::Timeout.is_retryable());
        assert!(!DeliveryOutcome::Delivered.is_retryable());
    }
}
