use crate::breaker::CircuitBreaker;
use crate::retry::{fetch_with_retry, RetryPolicy};
use anyhow::{Context, Result};
use cmw_config::MonitorConfig;
use cmw_engine::{
    check_signal, format_uptime, iso_utc, reconcile, EngineState, ReconcileConfig, ReconcileReport,
    Reconciliation, SignalThresholds, SignalWarning, SignalWarningKind,
};
use cmw_report::CsvSink;
use cmw_source::SnapshotSource;
use cmw_state::StateStore;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Loop policy, resolved from [`MonitorConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub retry: RetryPolicy,
    pub reconcile: ReconcileConfig,
    pub thresholds: SignalThresholds,
}

impl PollSettings {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self {
            interval: cfg.poll.interval(),
            retry: RetryPolicy::from_config(&cfg.poll.retry),
            reconcile: cfg.reconcile_config(),
            thresholds: cfg.signal_thresholds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Reconciled {
        report: ReconcileReport,
        warnings: Vec<SignalWarning>,
    },
    /// The breaker is open; no fetch was attempted.
    Skipped { retry_in: Duration },
}

/// One device's poll loop: owns the source, the stores and the engine state.
pub struct Poller<S> {
    source: S,
    store: StateStore,
    sink: CsvSink,
    settings: PollSettings,
    breaker: CircuitBreaker,
    state: Option<EngineState>,
}

impl<S: SnapshotSource> Poller<S> {
    /// Loads prior engine state from `store` once; later cycles use memory.
    pub fn new(
        source: S,
        store: StateStore,
        sink: CsvSink,
        settings: PollSettings,
        breaker: CircuitBreaker,
    ) -> Self {
        let state = store.load();
        Self {
            source,
            store,
            sink,
            settings,
            breaker,
            state,
        }
    }

    pub fn state(&self) -> Option<&EngineState> {
        self.state.as_ref()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// fetch (with retry) -> csv -> signal check -> reconcile -> save -> log.
    pub async fn poll_once(&mut self, now: Instant) -> Result<PollOutcome> {
        if !self.breaker.allow(now) {
            let retry_in = self.breaker.remaining(now);
            debug!(retry_in_secs = retry_in.as_secs(), "circuit open; skipping poll");
            return Ok(PollOutcome::Skipped { retry_in });
        }

        let started = Instant::now();
        let status = match fetch_with_retry(&self.source, &self.settings.retry).await {
            Ok(status) => status,
            Err(e) => {
                // Retries can take minutes; the cooldown runs from the last failure.
                let failed_at = now + started.elapsed();
                if self.breaker.record_failure(failed_at) {
                    error!(
                        source = self.source.name(),
                        consecutive_failures = self.breaker.consecutive_failures(),
                        cooldown_secs = self.breaker.remaining(failed_at).as_secs(),
                        "circuit breaker opened; pausing polls"
                    );
                }
                return Err(e).with_context(|| {
                    format!("snapshot acquisition from {} failed", self.source.name())
                });
            }
        };
        if self.breaker.record_success() {
            info!(source = self.source.name(), "circuit breaker closed; modem reachable");
        }

        // Series files are secondary output; accounting goes on without them.
        if let Err(e) = self.sink.append(&status) {
            error!(dir = %self.sink.dir().display(), "csv append failed: {e:#}");
        }

        let snapshot = status.snapshot();
        let warnings = check_signal(&snapshot, &self.settings.thresholds);
        log_warnings(status.system_time, &warnings);

        let Reconciliation { report, state } = reconcile(
            &self.settings.reconcile,
            self.state.take(),
            snapshot,
            status.uptime_secs,
        );
        let saved = self.store.save(&state);
        self.state = Some(state);
        log_report(&report, status.uptime_secs);
        saved.with_context(|| format!("persist state to {} failed", self.store.path().display()))?;

        Ok(PollOutcome::Reconciled { report, warnings })
    }

    /// Poll every `interval` until `shutdown` resolves. A failed cycle is
    /// logged and never ends the loop.
    ///
    /// Shutdown also interrupts a cycle that is still fetching or backing off.
    /// Everything after the fetch is synchronous, so an interrupted cycle
    /// leaves state and series files untouched.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            // Polled first so every loop iteration attempts one cycle.
            tokio::select! {
                biased;
                res = self.poll_once(Instant::now()) => {
                    if let Err(e) = res {
                        error!("poll cycle failed: {e:#}");
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown requested during poll; stopping poll loop");
                    break;
                }
            }
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; stopping poll loop");
                    break;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}

fn log_warnings(system_time: i64, warnings: &[SignalWarning]) {
    let at = iso_utc(system_time);
    for w in warnings {
        match w.kind {
            SignalWarningKind::LowSnr => warn!(
                system_time = %at,
                freq_mhz = w.freq.as_mhz(),
                snr_db = w.value,
                "SNR too low"
            ),
            SignalWarningKind::PowerOutOfRange => warn!(
                system_time = %at,
                freq_mhz = w.freq.as_mhz(),
                power_dbmv = w.value,
                "power out of range"
            ),
        }
    }
}

/// Emit the log events for one reconciliation.
pub fn log_report(report: &ReconcileReport, uptime_secs: i64) {
    let at = iso_utc(report.system_time);

    if report.first_run {
        debug!(system_time = %at, "no prior state; baseline seeded from this poll");
    }

    if let Some(r) = &report.reboot {
        info!(
            new_boot = %iso_utc(r.new_boot_time),
            new_uptime = %format_uptime(r.new_uptime),
            old_boot = %iso_utc(r.old_boot_time),
            old_uptime = %format_uptime(r.old_uptime),
            "modem rebooted; error counters restart from zero"
        );
    }

    if let Some(r) = &report.counter_reset {
        info!(
            freq_mhz = r.freq.as_mhz(),
            correctable = r.delta.correctable,
            uncorrectable = r.delta.uncorrectable,
            "negative error delta without reboot; all counters treated as reset"
        );
    }

    for freq in &report.vanished {
        info!(freq_mhz = freq.as_mhz(), "channel no longer utilised");
    }

    for (freq, d) in report.new_errors() {
        info!(
            system_time = %at,
            freq_mhz = freq.as_mhz(),
            correctable = d.correctable,
            uncorrectable = d.uncorrectable,
            "new errors"
        );
    }

    info!(
        system_time = %at,
        uptime = %format_uptime(uptime_secs),
        logged = report.logged,
        "data refreshed"
    );
}
