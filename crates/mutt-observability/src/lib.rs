//! Logging and metrics setup shared by every service binary, so each one
//! boots with the same JSON log shape and exposes the same `/metrics`
//! contract instead of rolling its own.

mod logging;
mod metrics;

pub use logging::init;
pub use metrics::{
    metrics_handler, observe_latency, record_remediation_replay, record_request, record_shed, render,
    set_breaker_state, set_queue_depth,
};
