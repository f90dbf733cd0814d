//! Key and topic conventions for the substrate — centralized as `const`s
//! so no call site re-types a literal and drifts from this list.

pub const RAW_QUEUE: &str = "mutt:ingest_queue";
pub const ALERT_QUEUE: &str = "mutt:alert_queue";

pub const DLQ_ALERTER: &str = "mutt:dlq:alerter";
pub const DLQ_MOOG: &str = "mutt:dlq:moog";
pub const QUARANTINE: &str = "mutt:quarantine";

pub const RATE_LIMIT_MOOG: &str = "mutt:rate_limit:moog";

pub const CONFIG_PREFIX: &str = "mutt:config:";
pub const CONFIG_UPDATES_TOPIC: &str = "mutt:config:updates";

pub const HEARTBEAT_TTL_SECS: u64 = 30;

/// `mutt:processing:<stage>:<worker_id>`
pub fn processing_list(stage: &str, worker_id: &str) -> String {
    format!("mutt:processing:{stage}:{worker_id}")
}

/// `mutt:heartbeat:<stage>:<worker_id>`
pub fn heartbeat_key(stage: &str, worker_id: &str) -> String {
    format!("mutt:heartbeat:{stage}:{worker_id}")
}

/// Prefix shared by every `processing.<stage>.*` key, used by the janitor
/// to enumerate peers via `SCAN`/`KEYS`.
pub fn processing_prefix(stage: &str) -> String {
    format!("mutt:processing:{stage}:")
}

pub fn heartbeat_prefix(stage: &str) -> String {
    format!("mutt:heartbeat:{stage}:")
}

/// Breaker state keys for a named shared breaker (only `moog` today).
pub mod breaker {
    pub fn state_key(name: &str) -> String {
        format!("mutt:circuit:{name}:state")
    }
    pub fn failures_key(name: &str) -> String {
        format!("mutt:circuit:{name}:failures")
    }
    pub fn opened_at_key(name: &str) -> String {
        format!("mutt:circuit:{name}:opened_at")
    }
}

pub fn config_key(name: &str) -> String {
    format!("{CONFIG_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_list_matches_spec_convention() {
        assert_eq!(processing_list("alerter", "w1"), "mutt:processing:alerter:w1");
    }

    #[test]
    fn heartbeat_key_matches_spec_convention() {
        assert_eq!(heartbeat_key("moog", "w2"), "mutt:heartbeat:moog:w2");
    }

    #[test]
    fn processing_key_starts_with_its_prefix() {
        let prefix = processing_prefix("alerter");
        let key = processing_list("alerter", "w9");
        assert!(key.starts_with(&prefix));
    }
}
