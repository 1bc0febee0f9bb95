//! Reconnect backoff policy.
//!
//! Pure delay computation; the supervisor owns the actual timer. Keeping
//! the arithmetic separate from scheduling makes the exact delay sequence
//! testable without a clock.

use std::time::Duration;

/// Exponential backoff with a cap and a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Total reconnect attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before reconnect attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`. Returns `None` once the attempt
    /// cap is exhausted.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let base_ms = self.base_delay.as_millis() as u64;
        let shift = (attempt - 1).min(20);
        let delay_ms = base_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay.as_millis() as u64);
        Some(Duration::from_millis(delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_sequence() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| policy.delay_before(n).unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![5_000, 10_000, 20_000, 40_000, 80_000]);
        assert!(policy.delay_before(6).is_none());
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = ReconnectPolicy {
            max_attempts: 12,
            ..ReconnectPolicy::default()
        };
        assert_eq!(
            policy.delay_before(7).unwrap(),
            Duration::from_millis(300_000)
        );
        assert_eq!(
            policy.delay_before(12).unwrap(),
            Duration::from_millis(300_000)
        );
    }

    #[test]
    fn attempt_zero_is_invalid() {
        assert!(ReconnectPolicy::default().delay_before(0).is_none());
    }

    #[test]
    fn large_shift_does_not_overflow() {
        let policy = ReconnectPolicy {
            max_attempts: u32::MAX,
            ..ReconnectPolicy::default()
        };
        assert_eq!(
            policy.delay_before(64).unwrap(),
            Duration::from_millis(300_000)
        );
    }
}
