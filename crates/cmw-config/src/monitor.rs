use anyhow::{bail, Result};
use cmw_engine::{ReconcileConfig, SignalThresholds};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Typed monitor configuration. Every key has a default, so `{}` is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub device: DeviceConfig,
    pub poll: PollConfig,
    pub engine: EngineConfig,
    pub thresholds: ThresholdConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub base_url: String,
    pub username: String,
    /// Name of the env var that holds the modem password.
    pub password_env: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.100.1".to_string(),
            username: "admin".to_string(),
            password_env: "CMW_MODEM_PASSWORD".to_string(),
            model: "CM1200v2".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_secs: 10,
            max_backoff_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// Consecutive failed cycles before the breaker opens.
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub reboot_tolerance_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reboot_tolerance_secs: ReconcileConfig::DEFAULT_REBOOT_TOLERANCE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    pub min_snr_db: f64,
    pub max_abs_power_dbmv: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_snr_db: SignalThresholds::DEFAULT_MIN_SNR_DB,
            max_abs_power_dbmv: SignalThresholds::DEFAULT_MAX_ABS_POWER_DBMV,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub state_file: String,
    pub csv_dir: String,
    pub downstream_columns: usize,
    pub upstream_columns: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            state_file: "ModemData.json".to_string(),
            csv_dir: "CM1200v2".to_string(),
            downstream_columns: 31,
            upstream_columns: 4,
        }
    }
}

impl MonitorConfig {
    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            reboot_tolerance_secs: self.engine.reboot_tolerance_secs,
        }
    }

    pub fn signal_thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            min_snr_db: self.thresholds.min_snr_db,
            max_abs_power_dbmv: self.thresholds.max_abs_power_dbmv,
        }
    }

    /// Reject values the poll loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.device.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID device.base_url must not be empty");
        }
        if self.device.password_env.trim().is_empty() {
            bail!("CONFIG_INVALID device.password_env must name an env var");
        }
        if self.device.request_timeout_secs == 0 {
            bail!("CONFIG_INVALID device.request_timeout_secs must be > 0");
        }
        if self.poll.interval_secs == 0 {
            bail!("CONFIG_INVALID poll.interval_secs must be > 0");
        }
        if self.poll.retry.max_attempts == 0 {
            bail!("CONFIG_INVALID poll.retry.max_attempts must be >= 1");
        }
        if self.poll.retry.initial_backoff_secs > self.poll.retry.max_backoff_secs {
            bail!("CONFIG_INVALID poll.retry.initial_backoff_secs exceeds max_backoff_secs");
        }
        if self.poll.breaker.failure_threshold == 0 {
            bail!("CONFIG_INVALID poll.breaker.failure_threshold must be >= 1");
        }
        if self.engine.reboot_tolerance_secs < 0 {
            bail!("CONFIG_INVALID engine.reboot_tolerance_secs must be >= 0");
        }
        if self.output.downstream_columns == 0 || self.output.upstream_columns == 0 {
            bail!("CONFIG_INVALID output column counts must be >= 1");
        }
        Ok(())
    }
}
