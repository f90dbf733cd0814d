//! Structured logging init, shared by every service binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the global tracing subscriber: JSON-formatted events, level
/// controlled by `RUST_LOG` (defaulting to `info`). Call once at process
/// start, before anything else logs.
pub fn init(service_name: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .init();

    tracing::info!(service = service_name, "logging initialized");
}
