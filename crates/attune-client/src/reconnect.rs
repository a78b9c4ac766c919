use std::time::Duration;

/// Where the policy is in its recovery cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectPhase {
    Idle,
    Attempting,
    Exhausted,
}

/// What the session should do after an unexpected close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Dial again after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// The ceiling was reached by this close. Report it.
    Exhausted { attempts: u32 },
    /// Already exhausted earlier; stay quiet until a manual reset.
    Halted,
}

/// Bounded reconnection with linear backoff: attempt `n` waits
/// `base_delay * n`, up to `max_attempts` attempts.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempts: u32,
    phase: ReconnectPhase,
}

impl ReconnectPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempts: 0,
            phase: ReconnectPhase::Idle,
        }
    }

    /// Handle a close the owner did not ask for. Increments the counter
    /// before returning a retry.
    pub fn on_unexpected_close(&mut self) -> ReconnectDecision {
        if self.phase == ReconnectPhase::Exhausted {
            return ReconnectDecision::Halted;
        }
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            self.phase = ReconnectPhase::Attempting;
            ReconnectDecision::Retry {
                attempt: self.attempts,
                delay: self.delay_for(self.attempts),
            }
        } else {
            self.phase = ReconnectPhase::Exhausted;
            ReconnectDecision::Exhausted {
                attempts: self.attempts,
            }
        }
    }

    /// The connection opened: forget past failures.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.phase = ReconnectPhase::Idle;
    }

    /// Manual override: counter back to zero and a fresh attempt cycle,
    /// even from `Exhausted`.
    pub fn begin_manual(&mut self) {
        self.attempts = 0;
        self.phase = ReconnectPhase::Attempting;
    }

    /// Stop tracking entirely (explicit disconnect).
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.phase = ReconnectPhase::Idle;
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == ReconnectPhase::Exhausted
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff() {
        let mut policy = ReconnectPolicy::default();
        let delays: Vec<_> = (0..5)
            .map(|_| match policy.on_unexpected_close() {
                ReconnectDecision::Retry { delay, .. } => delay.as_secs(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(delays, vec![1, 2, 3, 4, 5]);
        assert_eq!(policy.phase(), ReconnectPhase::Attempting);
    }

    #[test]
    fn attempt_numbers_are_one_based() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(100), 3);
        assert_eq!(
            policy.on_unexpected_close(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn exhaustion_is_reported_once() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..5 {
            assert!(matches!(
                policy.on_unexpected_close(),
                ReconnectDecision::Retry { .. }
            ));
        }
        assert_eq!(
            policy.on_unexpected_close(),
            ReconnectDecision::Exhausted { attempts: 5 }
        );
        assert!(policy.is_exhausted());
        assert_eq!(policy.on_unexpected_close(), ReconnectDecision::Halted);
        assert_eq!(policy.on_unexpected_close(), ReconnectDecision::Halted);
    }

    #[test]
    fn success_resets_counter() {
        let mut policy = ReconnectPolicy::default();
        let _ = policy.on_unexpected_close();
        let _ = policy.on_unexpected_close();
        policy.on_connected();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.phase(), ReconnectPhase::Idle);
        assert_eq!(
            policy.on_unexpected_close(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn manual_reset_leaves_exhausted() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 1);
        let _ = policy.on_unexpected_close();
        let _ = policy.on_unexpected_close();
        assert!(policy.is_exhausted());

        policy.begin_manual();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.phase(), ReconnectPhase::Attempting);
        assert!(matches!(
            policy.on_unexpected_close(),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn zero_ceiling_exhausts_immediately() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), 0);
        assert_eq!(
            policy.on_unexpected_close(),
            ReconnectDecision::Exhausted { attempts: 0 }
        );
    }
}
