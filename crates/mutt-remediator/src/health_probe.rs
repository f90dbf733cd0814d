//! A loose health gate for Moog replays: a bare `HEAD` against the
//! configured webhook base URL, falling back to `GET` for endpoints that
//! don't implement `HEAD`. Any response at all (even a 4xx/5xx) counts
//! as "reachable" — this only protects against replaying into a
//! completely unreachable endpoint, not against Moog-side rejections,
//! which the breaker already handles.

use std::time::Duration;

pub async fn moog_reachable(client: &reqwest::Client, base_url: &str, timeout: Duration) -> bool {
    let head = client.head(base_url).timeout(timeout).send().await;
    if head.is_ok() {
        return true;
    }

    client.get(base_url).timeout(timeout).send().await.is_ok()
}
