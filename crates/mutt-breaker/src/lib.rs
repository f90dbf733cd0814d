//! A circuit breaker whose state lives in the substrate instead of process
//! memory, so every Deliverer instance in the fleet opens and closes the
//! breaker in lockstep rather than each tripping independently.
//!
//! State transitions happen inside a single atomic script per call
//! ([`redis::Script`]/`EVALSHA`) so two instances racing to record a
//! failure, or one recording a failure while another checks state, can
//! never observe a torn update.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mutt_queue::QueueClient;
use redis::Script;

mod scripts;

/// Where the breaker currently stands. Numeric order (`Closed` = 0,
/// `Open` = 1, `HalfOpen` = 2) matches the gauge value callers publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_gauge_value(self) -> i64 {
        match self {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "open" => BreakerState::Open,
            "half_open" => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(60),
        }
    }
}

/// A named breaker backed by the substrate (one instance exists today:
/// `"moog"`, guarding calls to the webhook endpoint).
pub struct CircuitBreaker {
    name: String,
    queue: QueueClient,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, queue: QueueClient, config: BreakerConfig) -> Self {
        Self { name: name.into(), queue, config }
    }

    /// Whether a call should be allowed through right now. A `HalfOpen`
    /// result also counts as allowed — this is the probe attempt.
    pub async fn allow(&self) -> mutt_queue::QueueResult<bool> {
        let state = self.check_state().await?;
        Ok(state != BreakerState::Open)
    }

    /// Evaluate and, if the open window has elapsed, transition `Open` to
    /// `HalfOpen`. Safe to call on every request — cheap, single script.
    pub async fn check_state(&self) -> mutt_queue::QueueResult<BreakerState> {
        let now = unix_now();
        let raw: String = self
            .queue
            .run_atomic_script(
                &check_state_script(),
                &[
                    mutt_queue::keys::breaker::state_key(&self.name),
                    mutt_queue::keys::breaker::opened_at_key(&self.name),
                ],
                &[now.to_string(), self.config.open_duration.as_secs().to_string()],
            )
            .await?;
        Ok(BreakerState::parse(&raw))
    }

    pub async fn record_success(&self) -> mutt_queue::QueueResult<BreakerState> {
        let raw: String = self
            .queue
            .run_atomic_script(
                &on_success_script(),
                &[
                    mutt_queue::keys::breaker::state_key(&self.name),
                    mutt_queue::keys::breaker::failures_key(&self.name),
                ],
                &[] as &[String],
            )
            .await?;
        Ok(BreakerState::parse(&raw))
    }

    pub async fn record_failure(&self) -> mutt_queue::QueueResult<BreakerState> {
        let now = unix_now();
        let raw: String = self
            .queue
            .run_atomic_script(
                &on_failure_script(),
                &[
                    mutt_queue::keys::breaker::state_key(&self.name),
                    mutt_queue::keys::breaker::failures_key(&self.name),
                    mutt_queue::keys::breaker::opened_at_key(&self.name),
                ],
                &[self.config.failure_threshold.to_string(), now.to_string()],
            )
            .await?;
        Ok(BreakerState::parse(&raw))
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn check_state_script() -> Script {
    Script::new(scripts::CHECK_STATE)
}
fn on_success_script() -> Script {
    Script::new(scripts::ON_SUCCESS)
}
fn on_failure_script() -> Script {
    Script::new(scripts::ON_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_values_are_ordered_closed_open_half_open() {
        assert_eq!(BreakerState::Closed.as_gauge_value(), 0);
        assert_eq!(BreakerState::Open.as_gauge_value(), 1);
        assert_eq!(BreakerState::HalfOpen.as_gauge_value(), 2);
    }

    #[test]
    fn parse_defaults_unknown_strings_to_closed() {
        assert_eq!(BreakerState::parse("garbage"), BreakerState::Closed);
        assert_eq!(BreakerState::parse("open"), BreakerState::Open);
        assert_eq!(BreakerState::parse("half_open"), BreakerState::HalfOpen);
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.open_duration, Duration::from_secs(60));
    }
}
