//! Per-poll signal quality check for downstream channels.
//!
//! Independent of the delta engine: it looks at one snapshot only and flags
//! channels whose SNR or receive power is outside the usable DOCSIS range.

use crate::{ChannelSnapshot, FreqKey};

/// Limits for downstream signal quality.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignalThresholds {
    /// SNR below this (dB) is flagged.
    pub min_snr_db: f64,
    /// `|power|` above this (dBmV) is flagged.
    pub max_abs_power_dbmv: f64,
}

impl SignalThresholds {
    pub const DEFAULT_MIN_SNR_DB: f64 = 36.0;
    pub const DEFAULT_MAX_ABS_POWER_DBMV: f64 = 7.0;
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            min_snr_db: Self::DEFAULT_MIN_SNR_DB,
            max_abs_power_dbmv: Self::DEFAULT_MAX_ABS_POWER_DBMV,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalWarningKind {
    LowSnr,
    PowerOutOfRange,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignalWarning {
    pub freq: FreqKey,
    pub kind: SignalWarningKind,
    /// The offending reading (dB for SNR, dBmV for power).
    pub value: f64,
}

/// Flag every channel outside `thresholds`, in ascending frequency order.
/// A channel can produce both an SNR and a power warning.
pub fn check_signal(snapshot: &ChannelSnapshot, thresholds: &SignalThresholds) -> Vec<SignalWarning> {
    let mut out = Vec::new();
    for (freq, ch) in &snapshot.channels {
        if ch.snr_db < thresholds.min_snr_db {
            out.push(SignalWarning {
                freq: *freq,
                kind: SignalWarningKind::LowSnr,
                value: ch.snr_db,
            });
        }
        if ch.power_dbmv.abs() > thresholds.max_abs_power_dbmv {
            out.push(SignalWarning {
                freq: *freq,
                kind: SignalWarningKind::PowerOutOfRange,
                value: ch.power_dbmv,
            });
        }
    }
    out
}
