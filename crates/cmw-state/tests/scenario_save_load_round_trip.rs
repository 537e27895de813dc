//! Save then load reproduces the engine state exactly.
//!
//! GREEN when:
//! - Frequency keys, counters, boot/uptime and the error log survive a restart.
//! - A second save atomically replaces the first (no stale content, no temp
//!   files left behind).
//! - Saving into a directory that does not exist yet creates it.

use cmw_engine::{
    reconcile, ChannelReading, ChannelSnapshot, EngineState, ErrorDelta, FreqKey, LockStatus,
    ReconcileConfig,
};
use cmw_state::StateStore;
use std::fs;

fn ch(mhz: f64, corr: u64, uncorr: u64) -> ChannelReading {
    ChannelReading {
        channel_id: 1,
        status: LockStatus::Locked,
        modulation: "QAM256".to_string(),
        frequency_mhz: mhz,
        power_dbmv: 2.5,
        snr_db: 40.3,
        unerrored_codewords: 9_999,
        correctable_codewords: corr,
        uncorrectable_codewords: uncorr,
    }
}

fn two_polls() -> EngineState {
    let cfg = ReconcileConfig::default();
    let first = ChannelSnapshot::from_readings(vec![ch(507.0, 10, 1), ch(513.25, 0, 0)], 10_000, 5_000);
    let second = ChannelSnapshot::from_readings(vec![ch(507.0, 15, 1), ch(513.25, 2, 0)], 10_015, 5_015);
    let r1 = reconcile(&cfg, None, first, 5_000);
    reconcile(&cfg, Some(r1.state), second, 5_015).state
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("ModemData.json"));
    let st = two_polls();

    store.save(&st).unwrap();
    let back = store.try_load().unwrap().unwrap();

    assert_eq!(back, st);
    assert_eq!(
        back.error_log[&10_015][&FreqKey::from_khz(507_000)],
        ErrorDelta::new(5, 0)
    );
    assert!(back.previous_snapshot.contains(FreqKey::from_khz(513_250)));
}

#[test]
fn second_save_replaces_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("ModemData.json"));

    let seeded = EngineState::seeded(
        ChannelSnapshot::from_readings(vec![ch(507.0, 1, 1)], 100, 50),
        50,
    );
    store.save(&seeded).unwrap();
    let st = two_polls();
    store.save(&st).unwrap();

    assert_eq!(store.load().unwrap(), st);

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "only the state file should remain");
}

#[test]
fn save_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("nested").join("ModemData.json"));

    store.save(&two_polls()).unwrap();
    assert!(store.path().exists());
}
