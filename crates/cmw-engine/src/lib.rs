//! cmw-engine
//!
//! Error-counter reconciliation for cable-modem channel snapshots.
//!
//! Architectural decisions:
//! - Frequency (integer kHz) is the join key between polls, never channel number
//! - A boot time that jumps forward past the tolerance is a reboot: baseline zeroed
//! - Any negative counter delta is a silent reset: every channel's baseline zeroed
//! - Engine state is an explicit value owned by the caller (no statics)
//!
//! Pure deterministic logic. No IO, no wall-clock. Runtime provides the snapshot,
//! system time and uptime.

mod engine;
mod signal;
mod types;

pub use engine::{reconcile, signed_delta};
pub use signal::{check_signal, SignalThresholds, SignalWarning, SignalWarningKind};
pub use types::*;

use chrono::DateTime;

/// Render epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Out-of-range timestamps fall back to the raw number so a log line is never lost.
pub fn iso_utc(epoch_secs: i64) -> String {
    match DateTime::from_timestamp(epoch_secs, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => epoch_secs.to_string(),
    }
}

/// Render a duration in seconds the way uptime is shown on the status page
/// (`"3 days, 4:05:06"`).
pub fn format_uptime(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => format!("{sign}{h}:{m:02}:{s:02}"),
        1 => format!("{sign}1 day, {h}:{m:02}:{s:02}"),
        d => format!("{sign}{d} days, {h}:{m:02}:{s:02}"),
    }
}
