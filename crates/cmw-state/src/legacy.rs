//! Import of the pre-versioned state file.
//!
//! Older installs wrote a positional JSON array
//! `[prev_run, running_data, prev_boot, prev_uptime]` where `prev_run` is keyed
//! by MHz rendered as a float string (`"507.0"`) and channel fields use the
//! status-page column titles. Frequencies are re-keyed to integer kHz here.

use anyhow::{anyhow, bail, Context, Result};
use cmw_engine::{ChannelReading, ChannelSnapshot, DeltaSet, EngineState, ErrorDelta, FreqKey, LockStatus};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct LegacyChannel {
    #[serde(rename = "Channel ID")]
    channel_id: u32,
    #[serde(rename = "Power [dBmV]")]
    power_dbmv: f64,
    #[serde(rename = "SNR [dB]", default)]
    snr_db: f64,
    #[serde(rename = "Unerrored Codewords", default)]
    unerrored_codewords: u64,
    #[serde(rename = "Correctable Codewords")]
    correctable_codewords: u64,
    #[serde(rename = "UnCorrectable Codewords")]
    uncorrectable_codewords: u64,
}

type LegacyTuple = (
    BTreeMap<String, LegacyChannel>,
    BTreeMap<String, BTreeMap<String, (i64, i64)>>,
    f64,
    f64,
);

fn parse_mhz_key(s: &str) -> Result<FreqKey> {
    let mhz: f64 = s
        .trim()
        .parse()
        .with_context(|| format!("legacy frequency key is not a number: {s:?}"))?;
    Ok(FreqKey::from_mhz(mhz))
}

/// Whole seconds from a legacy float field. Non-finite or out-of-range values
/// mark the file as corrupt.
fn whole_secs(v: f64, what: &str) -> Result<i64> {
    let r = v.round();
    if !r.is_finite() || r < i64::MIN as f64 || r >= i64::MAX as f64 {
        bail!("legacy {what} out of range: {v}");
    }
    Ok(r as i64)
}

fn parse_epoch_key(s: &str) -> Result<i64> {
    let t = s.trim();
    if let Ok(v) = t.parse::<i64>() {
        return Ok(v);
    }
    let v = t
        .parse::<f64>()
        .map_err(|_| anyhow!("legacy timestamp key is not a number: {s:?}"))?;
    whole_secs(v, "timestamp key")
}

pub(crate) fn decode_legacy_tuple(v: Value) -> Result<EngineState> {
    let (prev_run, running_data, prev_boot, prev_uptime): LegacyTuple =
        serde_json::from_value(v).context("legacy state tuple decode failed")?;

    let previous_boot_time = whole_secs(prev_boot, "boot time")?;
    let previous_uptime = whole_secs(prev_uptime, "uptime")?;

    // The legacy file did not keep the device clock; boot + uptime recovers it.
    let system_time = previous_boot_time
        .checked_add(previous_uptime)
        .ok_or_else(|| anyhow!("legacy boot time + uptime overflows"))?;
    let mut snapshot = ChannelSnapshot::empty(system_time, previous_uptime);
    for (key, ch) in prev_run {
        let freq = parse_mhz_key(&key)?;
        snapshot.insert(ChannelReading {
            channel_id: ch.channel_id,
            status: LockStatus::Locked,
            modulation: String::new(),
            frequency_mhz: freq.as_mhz(),
            power_dbmv: ch.power_dbmv,
            snr_db: ch.snr_db,
            unerrored_codewords: ch.unerrored_codewords,
            correctable_codewords: ch.correctable_codewords,
            uncorrectable_codewords: ch.uncorrectable_codewords,
        });
    }

    let mut error_log: BTreeMap<i64, DeltaSet> = BTreeMap::new();
    for (ts, entries) in running_data {
        let ts = parse_epoch_key(&ts)?;
        let mut deltas = DeltaSet::new();
        for (key, (corr, uncorr)) in entries {
            deltas.insert(parse_mhz_key(&key)?, ErrorDelta::new(corr, uncorr));
        }
        error_log.insert(ts, deltas);
    }

    Ok(EngineState {
        previous_snapshot: snapshot,
        previous_boot_time,
        previous_uptime,
        error_log,
    })
}
