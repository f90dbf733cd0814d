//! The envelope every dead-letter and quarantine entry shares: the
//! original payload plus the reason it landed there, so the Remediator
//! can replay it and an operator can triage it without re-deriving
//! context from logs.

use serde::{Deserialize, Serialize};

use crate::error::PoisonRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// The original queue payload, kept verbatim so a successful replay
    /// reproduces exactly what would have been processed the first time.
    pub payload: serde_json::Value,
    pub poison: PoisonRecord,
}

impl DlqEntry {
    pub fn new(payload: serde_json::Value, error_type: impl Into<String>, error_message: impl Into<String>, retry_count: u32) -> Self {
        Self {
            payload,
            poison: PoisonRecord::new(error_type, error_message, retry_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let entry = DlqEntry::new(serde_json::json!({"hostname": "h"}), "parse_error", "boom", 1);
        let json = serde_json::to_string(&entry).unwrap();
        let back: DlqEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.poison.error_type, "parse_error");
        assert_eq!(back.poison.retry_count, 1);
    }
}
