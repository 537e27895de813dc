use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// kHz per MHz, the scale of [`FreqKey`].
pub const KHZ_PER_MHZ: f64 = 1_000.0;

/// Channel frequency as an integer number of kHz.
///
/// This is the identity used to match a channel across polls. The modem may
/// renumber channels between polls; the carrier frequency does not move.
/// Integer kHz avoids float equality when joining two snapshots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreqKey(pub u64);

impl FreqKey {
    pub fn from_khz(khz: u64) -> Self {
        Self(khz)
    }

    /// Round a MHz reading to the nearest kHz. Negative or NaN input maps to 0.
    pub fn from_mhz(mhz: f64) -> Self {
        let khz = (mhz * KHZ_PER_MHZ).round();
        if khz.is_finite() && khz > 0.0 {
            Self(khz as u64)
        } else {
            Self(0)
        }
    }

    pub fn khz(&self) -> u64 {
        self.0
    }

    pub fn as_mhz(&self) -> f64 {
        self.0 as f64 / KHZ_PER_MHZ
    }
}

impl fmt::Display for FreqKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} MHz", self.as_mhz())
    }
}

/// Lock state reported for a channel. Only locked channels are tracked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    #[default]
    Locked,
    NotLocked,
}

impl LockStatus {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("locked") {
            LockStatus::Locked
        } else {
            LockStatus::NotLocked
        }
    }
}

/// One locked downstream channel as read from the status page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelReading {
    pub channel_id: u32,
    #[serde(default)]
    pub status: LockStatus,
    #[serde(default)]
    pub modulation: String,
    pub frequency_mhz: f64,
    pub power_dbmv: f64,
    pub snr_db: f64,
    pub unerrored_codewords: u64,
    pub correctable_codewords: u64,
    pub uncorrectable_codewords: u64,
}

impl ChannelReading {
    pub fn freq_key(&self) -> FreqKey {
        FreqKey::from_mhz(self.frequency_mhz)
    }

    pub fn has_errors(&self) -> bool {
        self.correctable_codewords != 0 || self.uncorrectable_codewords != 0
    }
}

/// One locked upstream channel. Upstream carries no SNR and no codeword counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpstreamReading {
    pub channel_id: u32,
    pub status: LockStatus,
    pub channel_type: String,
    pub frequency_mhz: f64,
    pub power_dbmv: f64,
}

/// All locked downstream channels at one instant, keyed by frequency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channels: BTreeMap<FreqKey, ChannelReading>,
    /// Device clock at capture, epoch seconds.
    pub system_time: i64,
    /// `system_time - uptime`, epoch seconds.
    pub boot_time: i64,
}

impl ChannelSnapshot {
    pub fn from_readings<I>(readings: I, system_time: i64, uptime: i64) -> Self
    where
        I: IntoIterator<Item = ChannelReading>,
    {
        let channels = readings.into_iter().map(|r| (r.freq_key(), r)).collect();
        Self {
            channels,
            system_time,
            boot_time: system_time.saturating_sub(uptime),
        }
    }

    pub fn empty(system_time: i64, uptime: i64) -> Self {
        Self::from_readings(Vec::new(), system_time, uptime)
    }

    pub fn insert(&mut self, reading: ChannelReading) {
        self.channels.insert(reading.freq_key(), reading);
    }

    pub fn get(&self, freq: FreqKey) -> Option<&ChannelReading> {
        self.channels.get(&freq)
    }

    pub fn contains(&self, freq: FreqKey) -> bool {
        self.channels.contains_key(&freq)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Force the correctable and uncorrectable counters of every channel to zero.
    pub fn zero_error_counters(&mut self) {
        for reading in self.channels.values_mut() {
            reading.correctable_codewords = 0;
            reading.uncorrectable_codewords = 0;
        }
    }
}

/// New errors observed on one channel since the previous poll.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDelta {
    pub correctable: i64,
    pub uncorrectable: i64,
}

impl ErrorDelta {
    pub fn new(correctable: i64, uncorrectable: i64) -> Self {
        Self {
            correctable,
            uncorrectable,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.correctable == 0 && self.uncorrectable == 0
    }

    pub fn is_negative(&self) -> bool {
        self.correctable < 0 || self.uncorrectable < 0
    }
}

impl fmt::Display for ErrorDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "correctable=+{} uncorrectable=+{}",
            self.correctable, self.uncorrectable
        )
    }
}

/// New-error deltas of one poll, keyed by frequency.
pub type DeltaSet = BTreeMap<FreqKey, ErrorDelta>;

/// Reconciliation state carried between polls (persisted by the caller).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub previous_snapshot: ChannelSnapshot,
    pub previous_boot_time: i64,
    pub previous_uptime: i64,
    /// Accumulated new errors keyed by the device system time of the poll that saw them.
    pub error_log: BTreeMap<i64, DeltaSet>,
}

impl EngineState {
    /// Baseline state for a first run: the current snapshot becomes the reference.
    pub fn seeded(snapshot: ChannelSnapshot, uptime: i64) -> Self {
        let previous_boot_time = snapshot.boot_time;
        Self {
            previous_snapshot: snapshot,
            previous_boot_time,
            previous_uptime: uptime,
            error_log: BTreeMap::new(),
        }
    }

    /// Sum of every logged delta per frequency.
    pub fn error_totals(&self) -> DeltaSet {
        let mut totals = DeltaSet::new();
        for deltas in self.error_log.values() {
            for (freq, d) in deltas {
                let t = totals.entry(*freq).or_default();
                t.correctable = t.correctable.saturating_add(d.correctable);
                t.uncorrectable = t.uncorrectable.saturating_add(d.uncorrectable);
            }
        }
        totals
    }
}

/// Engine policy knobs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Boot-time jitter tolerated before a forward jump counts as a reboot.
    pub reboot_tolerance_secs: i64,
}

impl ReconcileConfig {
    pub const DEFAULT_REBOOT_TOLERANCE_SECS: i64 = 60;
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reboot_tolerance_secs: Self::DEFAULT_REBOOT_TOLERANCE_SECS,
        }
    }
}

/// The modem restarted between polls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RebootEvent {
    pub old_boot_time: i64,
    pub old_uptime: i64,
    pub new_boot_time: i64,
    pub new_uptime: i64,
}

/// Hardware counters went backwards without a reboot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CounterResetEvent {
    /// First channel (ascending frequency) whose delta was negative.
    pub freq: FreqKey,
    pub delta: ErrorDelta,
}

/// Outcome of one reconciliation, for logging and reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    pub system_time: i64,
    pub first_run: bool,
    pub reboot: Option<RebootEvent>,
    pub counter_reset: Option<CounterResetEvent>,
    /// New errors this poll. Vanished channels appear here with a zero delta.
    pub deltas: DeltaSet,
    /// Channels in the baseline that are no longer locked.
    pub vanished: Vec<FreqKey>,
    /// True when `deltas` was appended to the error log.
    pub logged: bool,
}

impl ReconcileReport {
    pub fn empty(system_time: i64) -> Self {
        Self {
            system_time,
            first_run: false,
            reboot: None,
            counter_reset: None,
            deltas: DeltaSet::new(),
            vanished: Vec::new(),
            logged: false,
        }
    }

    /// Deltas with at least one non-zero component.
    pub fn new_errors(&self) -> impl Iterator<Item = (&FreqKey, &ErrorDelta)> {
        self.deltas.iter().filter(|(_, d)| !d.is_zero())
    }

    pub fn has_new_errors(&self) -> bool {
        self.new_errors().next().is_some()
    }
}

/// Engine output: the report plus the state to persist.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub report: ReconcileReport,
    pub state: EngineState,
}
