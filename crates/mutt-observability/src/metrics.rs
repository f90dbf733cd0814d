//! The Prometheus metrics every service registers. Each service picks the
//! handful of metrics relevant to it — a `Metrics` handle is cheap and
//! clonable so it can be threaded through every task without wrapping it
//! in its own `Arc`.

use std::sync::LazyLock;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("mutt_requests_total", "Requests handled, by outcome"),
        &["service", "status", "reason"],
    )
    .expect("metric names/labels are valid");
    REGISTRY.register(Box::new(counter.clone())).expect("registered once");
    counter
});

static REQUEST_LATENCY_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(HistogramOpts::new(
        "mutt_request_latency_seconds",
        "End-to-end request/delivery latency",
    ))
    .expect("metric options are valid");
    REGISTRY.register(Box::new(histogram.clone())).expect("registered once");
    histogram
});

static QUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let gauge = IntGaugeVec::new(Opts::new("mutt_queue_depth", "Depth of a named queue/list"), &["queue"])
        .expect("metric names/labels are valid");
    REGISTRY.register(Box::new(gauge.clone())).expect("registered once");
    gauge
});

static BREAKER_STATE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let gauge = IntGaugeVec::new(
        Opts::new("mutt_breaker_state", "Circuit breaker state (0=closed, 1=open, 2=half_open)"),
        &["breaker"],
    )
    .expect("metric names/labels are valid");
    REGISTRY.register(Box::new(gauge.clone())).expect("registered once");
    gauge
});

static SHED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(Opts::new("mutt_shed_total", "Events rejected due to admission control"), &["stage"])
        .expect("metric names/labels are valid");
    REGISTRY.register(Box::new(counter.clone())).expect("registered once");
    counter
});

static REMEDIATION_REPLAYS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("mutt_remediation_replays_total", "Messages replayed from a dead-letter queue"),
        &["source_dlq", "outcome"],
    )
    .expect("metric names/labels are valid");
    REGISTRY.register(Box::new(counter.clone())).expect("registered once");
    counter
});

/// Record a completed request/delivery attempt.
pub fn record_request(service: &str, status: &str, reason: &str) {
    REQUESTS_TOTAL.with_label_values(&[service, status, reason]).inc();
}

pub fn observe_latency(seconds: f64) {
    REQUEST_LATENCY_SECONDS.observe(seconds);
}

pub fn set_queue_depth(queue: &str, depth: i64) {
    QUEUE_DEPTH.with_label_values(&[queue]).set(depth);
}

pub fn set_breaker_state(breaker: &str, state: i64) {
    BREAKER_STATE.with_label_values(&[breaker]).set(state);
}

pub fn record_shed(stage: &str) {
    SHED_TOTAL.with_label_values(&[stage]).inc();
}

pub fn record_remediation_replay(source_dlq: &str, outcome: &str) {
    REMEDIATION_REPLAYS_TOTAL.with_label_values(&[source_dlq, outcome]).inc();
}

/// Render the registry in Prometheus text exposition format.
pub fn render() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .expect("encoding a gathered registry cannot fail");
    String::from_utf8(buffer).expect("prometheus text encoding is always valid UTF-8")
}

/// An axum handler for `GET /metrics`, shared verbatim by every service.
pub async fn metrics_handler() -> Response {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], render()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_is_visible_in_render() {
        record_request("test-service", "ok", "delivered");
        let rendered = render();
        assert!(rendered.contains("mutt_requests_total"));
    }

    #[test]
    fn breaker_state_gauge_round_trips() {
        set_breaker_state("moog", 1);
        let rendered = render();
        assert!(rendered.contains("mutt_breaker_state"));
    }
}
