#![allow(dead_code)]

use cmw_engine::{ChannelReading, LockStatus};
use cmw_report::CsvSink;
use cmw_runtime::{CircuitBreaker, PollSettings, Poller, RetryPolicy};
use cmw_source::{DeviceStatus, SnapshotSource, SourceError};
use cmw_state::StateStore;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays scripted fetch results; once exhausted, every fetch fails.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<DeviceStatus, SourceError>>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<DeviceStatus, SourceError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_status(&self) -> Result<DeviceStatus, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Transport("script exhausted".to_string())))
    }
}

pub fn down(mhz: f64, corr: u64, uncorr: u64) -> ChannelReading {
    ChannelReading {
        channel_id: 1,
        status: LockStatus::Locked,
        modulation: "QAM256".to_string(),
        frequency_mhz: mhz,
        power_dbmv: 2.0,
        snr_db: 40.0,
        unerrored_codewords: 1_000,
        correctable_codewords: corr,
        uncorrectable_codewords: uncorr,
    }
}

pub fn status(system_time: i64, uptime_secs: i64, downstream: Vec<ChannelReading>) -> DeviceStatus {
    DeviceStatus {
        downstream,
        upstream: Vec::new(),
        system_time,
        uptime_secs,
    }
}

pub fn settings(max_attempts: u32) -> PollSettings {
    settings_with_backoff(max_attempts, Duration::ZERO)
}

/// Fixed backoff between attempts.
pub fn settings_with_backoff(max_attempts: u32, backoff: Duration) -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(3_600),
        retry: RetryPolicy {
            max_attempts,
            initial_backoff: backoff,
            max_backoff: backoff,
        },
        reconcile: Default::default(),
        thresholds: Default::default(),
    }
}

pub fn poller(
    dir: &Path,
    source: ScriptedSource,
    max_attempts: u32,
    breaker: CircuitBreaker,
) -> Poller<ScriptedSource> {
    poller_with(dir, source, settings(max_attempts), breaker)
}

pub fn poller_with(
    dir: &Path,
    source: ScriptedSource,
    settings: PollSettings,
    breaker: CircuitBreaker,
) -> Poller<ScriptedSource> {
    Poller::new(
        source,
        StateStore::new(dir.join("ModemData.json")),
        CsvSink::open(dir.join("csv"), 31, 4).unwrap(),
        settings,
        breaker,
    )
}

pub fn breaker() -> CircuitBreaker {
    CircuitBreaker::new(3, Duration::from_secs(300))
}
