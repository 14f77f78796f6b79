//! Per-subscription retry policy and its backoff schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SubscriptionError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_MS: u64 = 1_000;
const DEFAULT_MAX_MS: u64 = 60_000;

/// Exponential backoff settings for a delivery target.
///
/// The delay before retry `k` (1-indexed, counted after the initial try) is
/// `min(initial_ms * 2^(k-1), max_ms)` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Whether failed deliveries are retried at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Upper bound on any single delay
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_ms() -> u64 {
    DEFAULT_INITIAL_MS
}

fn default_max_ms() -> u64 {
    DEFAULT_MAX_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_retries: default_max_retries(),
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Number of retries this policy allows after the first attempt.
    pub fn retries(&self) -> u32 {
        if self.enabled {
            self.max_retries
        } else {
            0
        }
    }

    /// Delay to wait before retry `attempt` (1-indexed).
    ///
    /// `attempt == 0` is the initial try and has no delay.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let millis = self.initial_ms.saturating_mul(factor).min(self.max_ms);
        Duration::from_millis(millis)
    }

    /// Check the policy for internally inconsistent values.
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        if self.initial_ms > self.max_ms {
            return Err(SubscriptionError::InvalidRetry(
                "initial_ms must not exceed max_ms",
            ));
        }
        if self.enabled && self.max_retries > 0 && self.initial_ms == 0 {
            return Err(SubscriptionError::InvalidRetry(
                "initial_ms must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_ms, 1_000);
        assert_eq!(policy.max_ms, 60_000);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries":5}"#).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_ms, 1_000);
        assert_eq!(policy.max_ms, 60_000);
    }

    #[test]
    fn test_delay_sequence() {
        let policy = RetryPolicy {
            enabled: true,
            max_retries: 10,
            initial_ms: 1_000,
            max_ms: 60_000,
        };
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay(6), Duration::from_millis(32_000));
        assert_eq!(policy.delay(7), Duration::from_millis(60_000));
        assert_eq!(policy.delay(10), Duration::from_millis(60_000));
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = RetryPolicy {
            enabled: true,
            max_retries: u32::MAX,
            initial_ms: u64::MAX / 2,
            max_ms: u64::MAX,
        };
        assert_eq!(policy.delay(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_disabled_policy_has_no_retries() {
        let policy = RetryPolicy::disabled();
        assert_eq!(policy.retries(), 0);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let policy = RetryPolicy {
            initial_ms: 5_000,
            max_ms: 1_000,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_backoff_doubles_until_cap(
            initial in 1u64..10_000,
            max in 1u64..1_000_000,
            k in 1u32..40,
        ) {
            let policy = RetryPolicy { enabled: true, max_retries: 64, initial_ms: initial, max_ms: max };
            let current = policy.delay(k).as_millis() as u64;
            let next = policy.delay(k + 1).as_millis() as u64;

            if current.saturating_mul(2) <= max {
                prop_assert_eq!(next, current * 2);
            } else {
                prop_assert_eq!(next, max);
            }
            prop_assert!(next <= max);
        }
    }
}
