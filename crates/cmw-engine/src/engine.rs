use crate::{
    ChannelSnapshot, CounterResetEvent, DeltaSet, EngineState, ErrorDelta, FreqKey, RebootEvent,
    ReconcileConfig, ReconcileReport, Reconciliation,
};

/// `current - previous` as a signed counter delta, saturating at the `i64` bounds.
pub fn signed_delta(current: u64, previous: u64) -> i64 {
    let d = i128::from(current) - i128::from(previous);
    i64::try_from(d).unwrap_or(if d < 0 { i64::MIN } else { i64::MAX })
}

fn is_reboot(cfg: &ReconcileConfig, prev_boot_time: i64, boot_time: i64) -> bool {
    boot_time > prev_boot_time.saturating_add(cfg.reboot_tolerance_secs)
}

/// First channel present on both sides whose counters went backwards.
fn find_counter_reset(
    baseline: &ChannelSnapshot,
    current: &ChannelSnapshot,
) -> Option<CounterResetEvent> {
    for (freq, old) in &baseline.channels {
        if let Some(new) = current.get(*freq) {
            let delta = ErrorDelta::new(
                signed_delta(new.correctable_codewords, old.correctable_codewords),
                signed_delta(new.uncorrectable_codewords, old.uncorrectable_codewords),
            );
            if delta.is_negative() {
                return Some(CounterResetEvent { freq: *freq, delta });
            }
        }
    }
    None
}

/// Deltas between a (corrected) baseline and the current snapshot.
/// Returns the delta set plus the channels that disappeared.
fn compute_deltas(
    baseline: &ChannelSnapshot,
    current: &ChannelSnapshot,
) -> (DeltaSet, Vec<FreqKey>) {
    let mut deltas = DeltaSet::new();
    let mut vanished = Vec::new();

    for (freq, old) in &baseline.channels {
        match current.get(*freq) {
            Some(new) => {
                let d = ErrorDelta::new(
                    signed_delta(new.correctable_codewords, old.correctable_codewords),
                    signed_delta(new.uncorrectable_codewords, old.uncorrectable_codewords),
                );
                if !d.is_zero() {
                    deltas.insert(*freq, d);
                }
            }
            None => {
                // Recorded as (0, 0) so the disappearance is visible in the log.
                deltas.insert(*freq, ErrorDelta::default());
                vanished.push(*freq);
            }
        }
    }

    for (freq, new) in &current.channels {
        if !baseline.contains(*freq) && new.has_errors() {
            deltas.insert(
                *freq,
                ErrorDelta::new(
                    signed_delta(new.correctable_codewords, 0),
                    signed_delta(new.uncorrectable_codewords, 0),
                ),
            );
        }
    }

    (deltas, vanished)
}

/// Reconcile a new snapshot against the prior engine state.
///
/// Order of evaluation:
/// 1. No prior state: seed the baseline from `snapshot`, empty report.
/// 2. Reboot (boot time moved forward past tolerance): the current snapshot,
///    with error counters zeroed, replaces the baseline.
/// 3. Silent reset (any negative delta on a shared channel): every baseline
///    channel's error counters are zeroed.
/// 4. Deltas: shared channels (non-zero only), vanished channels (0, 0),
///    new channels that already carry errors (raw counts).
///
/// Never fails. The returned state is what the caller persists.
pub fn reconcile(
    cfg: &ReconcileConfig,
    prior: Option<EngineState>,
    snapshot: ChannelSnapshot,
    uptime: i64,
) -> Reconciliation {
    let system_time = snapshot.system_time;

    let Some(prior) = prior else {
        let mut report = ReconcileReport::empty(system_time);
        report.first_run = true;
        return Reconciliation {
            report,
            state: EngineState::seeded(snapshot, uptime),
        };
    };

    let EngineState {
        previous_snapshot: mut baseline,
        previous_boot_time,
        previous_uptime,
        mut error_log,
    } = prior;

    let mut current = snapshot;
    let mut report = ReconcileReport::empty(system_time);

    if is_reboot(cfg, previous_boot_time, current.boot_time) {
        // Counters restarted with the modem; the post-boot snapshot is the new zero.
        current.zero_error_counters();
        baseline = current.clone();
        report.reboot = Some(RebootEvent {
            old_boot_time: previous_boot_time,
            old_uptime: previous_uptime,
            new_boot_time: current.boot_time,
            new_uptime: uptime,
        });
    }

    if let Some(reset) = find_counter_reset(&baseline, &current) {
        // One negative delta means the whole counter bank was cleared together.
        baseline.zero_error_counters();
        report.counter_reset = Some(reset);
    }

    let (deltas, vanished) = compute_deltas(&baseline, &current);
    if !deltas.is_empty() {
        error_log.insert(system_time, deltas.clone());
        report.logged = true;
    }
    report.deltas = deltas;
    report.vanished = vanished;

    let boot_time = current.boot_time;
    Reconciliation {
        report,
        state: EngineState {
            previous_snapshot: current,
            previous_boot_time: boot_time,
            previous_uptime: uptime,
            error_log,
        },
    }
}
