use cmw_config::BreakerConfig;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Cycles are skipped until the cooldown elapses.
    Open { since: Instant },
    /// One trial cycle is allowed.
    HalfOpen,
}

/// Counts consecutive failed poll cycles and pauses polling once the device
/// looks persistently unreachable. Time is passed in by the caller.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            consecutive_failures: 0,
            state: BreakerState::Closed,
        }
    }

    pub fn from_config(cfg: &BreakerConfig) -> Self {
        Self::new(cfg.failure_threshold, Duration::from_secs(cfg.cooldown_secs))
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether a cycle may run at `now`. An open breaker whose cooldown has
    /// elapsed moves to half-open and allows the trial.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open { since } => {
                if now.saturating_duration_since(since) >= self.cooldown {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Time left before an open breaker allows a trial cycle.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.state {
            BreakerState::Open { since } => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(since)),
            _ => Duration::ZERO,
        }
    }

    /// Returns true when this success closed a previously tripped breaker.
    pub fn record_success(&mut self) -> bool {
        let was_tripped = self.state != BreakerState::Closed;
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        was_tripped
    }

    /// Returns true when this failure opened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        match self.state {
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open { since: now };
                true
            }
            BreakerState::Closed if self.consecutive_failures >= self.failure_threshold => {
                self.state = BreakerState::Open { since: now };
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_at_threshold_and_recovers_after_cooldown() {
        let t0 = Instant::now();
        let mut b = CircuitBreaker::new(3, Duration::from_secs(300));

        assert!(!b.record_failure(t0));
        assert!(!b.record_failure(t0));
        assert!(b.record_failure(t0), "third failure opens");
        assert!(!b.allow(t0 + Duration::from_secs(10)));
        assert_eq!(b.remaining(t0 + Duration::from_secs(10)), Duration::from_secs(290));

        assert!(b.allow(t0 + Duration::from_secs(300)));
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(b.record_success(), "trial success closes");
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let t0 = Instant::now();
        let mut b = CircuitBreaker::new(1, Duration::from_secs(60));
        assert!(b.record_failure(t0));

        let t1 = t0 + Duration::from_secs(61);
        assert!(b.allow(t1));
        assert!(b.record_failure(t1));
        assert!(!b.allow(t1 + Duration::from_secs(1)));
    }

    #[test]
    fn success_while_closed_is_not_a_transition() {
        let mut b = CircuitBreaker::new(3, Duration::from_secs(60));
        b.record_failure(Instant::now());
        assert!(!b.record_success());
    }
}
