//! The in-flight event and its wire/internal envelopes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Syslog,
    Snmp,
}

/// The event as it arrives on the wire and as it is handed between stages.
///
/// Unknown fields are preserved in `extra` rather than rejected: a future
/// field added upstream should not make older Classifier/Deliverer
/// instances fail deserialization mid-rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_severity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trap_oid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A structured reason a submitted event was rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl Event {
    /// Validate required fields and the documented optional-field ranges.
    ///
    /// Does not assign `correlation_id` or stamp `ingestion_timestamp` —
    /// that happens in the Ingestor after validation passes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hostname.trim().is_empty() {
            return Err(ValidationError {
                field: "hostname".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.message.is_empty() {
            return Err(ValidationError {
                field: "message".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(sev) = self.syslog_severity
            && sev > 7
        {
            return Err(ValidationError {
                field: "syslog_severity".to_string(),
                reason: "must be 0..=7".to_string(),
            });
        }
        if let Some(oid) = &self.trap_oid
            && !oid.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(ValidationError {
                field: "trap_oid".to_string(),
                reason: "must be dotted numeric".to_string(),
            });
        }
        Ok(())
    }
}

/// Private, never-serialized-to-wire annotations stages attach to an event.
///
/// This travels with the event inside queue payloads but is stripped
/// before any value derived from it reaches an external API response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalAnnotations {
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_assignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handling: Option<String>,
    #[serde(default)]
    pub is_dev: bool,
}

/// An [`Event`] paired with its [`InternalAnnotations`] — the shape that
/// actually travels through `raw_queue` and `alert_queue` once a stage has
/// touched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default, rename = "_annotations")]
    pub annotations: InternalAnnotations,
}

impl EnrichedEvent {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            annotations: InternalAnnotations::default(),
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.event.correlation_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            timestamp: Utc::now(),
            hostname: "router-01".to_string(),
            message: "Interface down".to_string(),
            source: Some(EventSource::Syslog),
            syslog_severity: Some(3),
            trap_oid: None,
            correlation_id: None,
            ingestion_timestamp: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn rejects_empty_hostname() {
        let mut e = sample_event();
        e.hostname = String::new();
        assert_eq!(e.validate().unwrap_err().field, "hostname");
    }

    #[test]
    fn rejects_empty_message() {
        let mut e = sample_event();
        e.message = String::new();
        assert_eq!(e.validate().unwrap_err().field, "message");
    }

    #[test]
    fn rejects_out_of_range_severity() {
        let mut e = sample_event();
        e.syslog_severity = Some(8);
        assert_eq!(e.validate().unwrap_err().field, "syslog_severity");
    }

    #[test]
    fn rejects_non_numeric_trap_oid() {
        let mut e = sample_event();
        e.trap_oid = Some("1.3.six.1".to_string());
        assert_eq!(e.validate().unwrap_err().field, "trap_oid");
    }

    #[test]
    fn accepts_well_formed_event() {
        let e = sample_event();
        assert!(e.validate().is_ok());
    }

    #[test]
    fn round_trips_through_json_preserving_unknown_fields() {
        let json = r#"{"timestamp":"2025-01-12T10:30:00Z","hostname":"h","message":"m","future_field":"x"}"#;
        let e: Event = serde_json::from_str(json).unwrap();
        assert_eq!(e.extra.get("future_field").unwrap(), "x");
        let back = serde_json::to_string(&e).unwrap();
        assert!(back.contains("future_field"));
    }

    #[test]
    fn enriched_event_annotations_not_present_on_wire_by_default() {
        let enriched = EnrichedEvent::new(sample_event());
        let json = serde_json::to_value(&enriched).unwrap();
        // annotations are flattened under a private key, not merged into
        // the public-looking fields.
        assert!(json.get("_annotations").is_some());
        assert!(json.get("retry_count").is_none());
    }
}
