use cmw_config::RetryConfig;
use cmw_source::{DeviceStatus, SnapshotSource, SourceError};
use std::time::Duration;
use tracing::warn;

/// Bounded retry within one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_secs(cfg.initial_backoff_secs),
            max_backoff: Duration::from_secs(cfg.max_backoff_secs),
        }
    }

    /// Delay after the `failures`-th consecutive failure (1-based):
    /// initial, 2x, 4x, ... capped at `max_backoff`.
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Fetch from `source`, retrying with backoff up to `policy.max_attempts`.
/// Returns the last error once attempts are exhausted.
pub async fn fetch_with_retry<S>(source: &S, policy: &RetryPolicy) -> Result<DeviceStatus, SourceError>
where
    S: SnapshotSource + ?Sized,
{
    let mut attempt = 1;
    loop {
        match source.fetch_status().await {
            Ok(status) => return Ok(status),
            Err(e) if attempt >= policy.max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    source = source.name(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    retry_in_secs = delay.as_secs_f64(),
                    "modem fetch failed: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(120),
        };
        let secs: Vec<u64> = (1..=6).map(|n| p.backoff_for(n).as_secs()).collect();
        assert_eq!(secs, vec![10, 20, 40, 80, 120, 120]);
        assert_eq!(p.backoff_for(1_000), Duration::from_secs(120));
    }

    #[test]
    fn zero_attempts_in_config_still_tries_once() {
        let cfg = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&cfg).max_attempts, 1);
    }
}
