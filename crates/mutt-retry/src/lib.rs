//! Backoff strategies and capped-delay helpers for distributed retry.
//!
//! This crate provides a configurable [`BackoffConfig`]/[`calculate_delay`]
//! pair for services that want a tunable strategy (the Classifier's
//! in-loop retry sleep), plus two small pure functions,
//! [`deliverer_backoff`] and [`remediation_spacing`], that hardcode the
//! specific caps their callers need so no call site has to re-derive them.
//!
//! # Example
//!
//! ```
//! use mutt_retry::{BackoffConfig, calculate_delay};
//!
//! let config = BackoffConfig::default();
//! let delay = calculate_delay(&config, 2);
//! assert!(delay <= config.max_delay);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Immediate,
    #[default]
    Exponential,
    Linear,
    Constant,
}

/// Tunable backoff configuration, serializable from dynamic config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter factor in `0.0..=1.0`; `0.0` disables jitter entirely.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_base_delay() -> Duration {
    Duration::from_millis(200)
}
fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}
fn default_jitter() -> f64 {
    0.3
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

/// Delay before the `attempt`-th retry (1-indexed), capped at
/// `config.max_delay` and then jittered.
pub fn calculate_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    let raw = match config.strategy {
        BackoffStrategy::Immediate => Duration::ZERO,
        BackoffStrategy::Exponential => {
            let pow = attempt.saturating_sub(1).min(20);
            config.base_delay.saturating_mul(2_u32.saturating_pow(pow))
        }
        BackoffStrategy::Linear => config.base_delay.saturating_mul(attempt.max(1)),
        BackoffStrategy::Constant => config.base_delay,
    };
    let capped = raw.min(config.max_delay);
    if config.jitter > 0.0 {
        jittered(capped, config.jitter)
    } else {
        capped
    }
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    use rand::Rng;
    let jitter = jitter.clamp(0.0, 1.0);
    let mut rng = rand::thread_rng();
    let factor = 1.0 - jitter + rng.gen::<f64>() * (2.0 * jitter);
    let millis = (delay.as_millis() as f64 * factor).round().max(0.0) as u64;
    Duration::from_millis(millis)
}

/// `min(2^retry, 60s)` — the Deliverer's retry backoff.
pub fn deliverer_backoff(retry_count: u32) -> Duration {
    capped_power_of_two(retry_count, Duration::from_secs(60))
}

/// `min(2^retry_count, 3600s)` — the Remediator's required spacing between
/// replay attempts.
pub fn remediation_spacing(retry_count: u32) -> Duration {
    capped_power_of_two(retry_count, Duration::from_secs(3600))
}

fn capped_power_of_two(exponent: u32, cap: Duration) -> Duration {
    let pow = exponent.min(20);
    Duration::from_secs(1).saturating_mul(2_u32.saturating_pow(pow)).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delay_doubles_without_jitter() {
        let config = BackoffConfig {
            jitter: 0.0,
            ..BackoffConfig::default()
        };
        assert_eq!(calculate_delay(&config, 1), config.base_delay);
        assert_eq!(calculate_delay(&config, 2), config.base_delay * 2);
        assert_eq!(calculate_delay(&config, 3), config.base_delay * 4);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let config = BackoffConfig {
            jitter: 0.0,
            max_delay: Duration::from_secs(5),
            ..BackoffConfig::default()
        };
        assert_eq!(calculate_delay(&config, 30), Duration::from_secs(5));
    }

    #[test]
    fn deliverer_backoff_is_monotonic_and_capped_at_60s() {
        let mut prev = Duration::ZERO;
        for retry in 0..10 {
            let d = deliverer_backoff(retry);
            assert!(d >= prev);
            assert!(d <= Duration::from_secs(60));
            prev = d;
        }
        assert_eq!(deliverer_backoff(10), Duration::from_secs(60));
    }

    #[test]
    fn remediation_spacing_is_capped_at_3600s() {
        assert_eq!(remediation_spacing(0), Duration::from_secs(1));
        assert_eq!(remediation_spacing(3), Duration::from_secs(8));
        assert_eq!(remediation_spacing(20), Duration::from_secs(3600));
    }

    #[test]
    fn jitter_keeps_delay_within_expected_band() {
        let config = BackoffConfig {
            strategy: BackoffStrategy::Constant,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(100),
            jitter: 0.5,
        };
        for _ in 0..50 {
            let d = calculate_delay(&config, 1);
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(15));
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn calculate_delay_never_exceeds_max_delay(
                strategy_variant in 0u8..4,
                base_ms in 1u64..5_000,
                max_ms in 1u64..120_000,
                jitter in 0.0f64..1.0,
                attempt in 0u32..50,
            ) {
                let strategy = match strategy_variant {
                    0 => BackoffStrategy::Immediate,
                    1 => BackoffStrategy::Exponential,
                    2 => BackoffStrategy::Linear,
                    _ => BackoffStrategy::Constant,
                };
                let config = BackoffConfig {
                    strategy,
                    base_delay: Duration::from_millis(base_ms),
                    max_delay: Duration::from_millis(max_ms),
                    jitter,
                };
                let delay = calculate_delay(&config, attempt);
                prop_assert!(delay <= config.max_delay);
            }

            #[test]
            fn capped_power_of_two_helpers_never_exceed_their_cap(retry_count in 0u32..64) {
                prop_assert!(deliverer_backoff(retry_count) <= Duration::from_secs(60));
                prop_assert!(remediation_spacing(retry_count) <= Duration::from_secs(3600));
            }
        }
    }
}
