//! Tracks events that matched only the default rule — "unhandled" in the
//! sense that no operator-authored rule claimed them — so a flood of a
//! new, unrecognized source pattern surfaces as one meta-alert instead of
//! silently vanishing into `log_only`.
//!
//! Source signature: `blake3(lowercased, whitespace-collapsed hostname +
//! first 64 bytes of message)`. Any stable digest would do here; `blake3`
//! is the concrete choice this implementation makes — see the crate's
//! module docs for why a choice was needed at all.

use std::time::Duration;

use mutt_queue::QueueClient;

const SLIDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Meta-alerts fire the first time a signature is seen in the window, not
/// on every repeat — otherwise a sustained flood would itself flood the
/// alert queue.
const META_ALERT_THRESHOLD: u64 = 1;

pub fn source_signature(hostname: &str, message: &str) -> String {
    let collapsed_host: String = hostname.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated_message: String = message.chars().take(64).collect::<String>().to_lowercase();
    let collapsed_message: String = truncated_message.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = blake3::Hasher::new();
    hasher.update(collapsed_host.as_bytes());
    hasher.update(b"\0");
    hasher.update(collapsed_message.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn counter_key(signature: &str) -> String {
    format!("mutt:unhandled:{signature}")
}

/// Record one occurrence of `signature`, refreshing its sliding 24h
/// window. Returns `true` the first time this signature is seen in the
/// current window — the caller should emit a meta-alert exactly then.
pub async fn record_occurrence(queue: &QueueClient, signature: &str) -> mutt_queue::QueueResult<bool> {
    let key = counter_key(signature);
    let previous: u64 = queue.get(&key).await?.and_then(|v| v.parse().ok()).unwrap_or(0);
    let next = previous.saturating_add(1);
    queue.set_with_ttl(&key, &next.to_string(), SLIDING_TTL).await?;
    Ok(previous < META_ALERT_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_across_case_and_whitespace() {
        let a = source_signature("Router-01", "Interface  DOWN  now");
        let b = source_signature("router-01", "interface down now");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_differs_for_different_hosts() {
        let a = source_signature("router-01", "Interface down");
        let b = source_signature("router-02", "Interface down");
        assert_ne!(a, b);
    }

    #[test]
    fn signature_only_considers_first_64_bytes_of_message() {
        let long_prefix = "x".repeat(64);
        let a = source_signature("h", &format!("{long_prefix}AAAA"));
        let b = source_signature("h", &format!("{long_prefix}ZZZZ"));
        assert_eq!(a, b);
    }
}
