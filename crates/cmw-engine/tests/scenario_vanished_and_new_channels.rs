use cmw_engine::*;

fn ch(mhz: f64, corr: u64, uncorr: u64) -> ChannelReading {
    ChannelReading {
        channel_id: 2,
        status: LockStatus::Locked,
        modulation: "QAM256".to_string(),
        frequency_mhz: mhz,
        power_dbmv: -1.0,
        snr_db: 38.0,
        unerrored_codewords: 10,
        correctable_codewords: corr,
        uncorrectable_codewords: uncorr,
    }
}

#[test]
fn scenario_vanished_channel_recorded_as_zero_delta() {
    let cfg = ReconcileConfig::default();
    let old = ChannelSnapshot::from_readings(vec![ch(507.0, 10, 0), ch(513.0, 7, 7)], 1_000, 900);
    let prior = EngineState::seeded(old, 900);

    let new = ChannelSnapshot::from_readings(vec![ch(507.0, 10, 0)], 1_015, 915);
    let out = reconcile(&cfg, Some(prior), new, 915);

    let gone = FreqKey::from_mhz(513.0);
    assert_eq!(out.report.vanished, vec![gone]);
    assert_eq!(out.report.deltas.get(&gone), Some(&ErrorDelta::new(0, 0)));
    assert!(!out.report.has_new_errors());
    // The disappearance is still logged.
    assert!(out.report.logged);
    assert_eq!(out.state.error_log[&1_015][&gone], ErrorDelta::default());
    assert!(!out.state.previous_snapshot.contains(gone));
}

#[test]
fn scenario_new_channel_with_errors_reports_raw_counts() {
    let cfg = ReconcileConfig::default();
    let old = ChannelSnapshot::from_readings(vec![ch(507.0, 10, 0)], 1_000, 900);
    let prior = EngineState::seeded(old, 900);

    let new = ChannelSnapshot::from_readings(
        vec![ch(507.0, 10, 0), ch(531.0, 25, 4), ch(537.0, 0, 0)],
        1_015,
        915,
    );
    let out = reconcile(&cfg, Some(prior), new, 915);

    assert_eq!(
        out.report.deltas.get(&FreqKey::from_mhz(531.0)),
        Some(&ErrorDelta::new(25, 4))
    );
    // A clean new channel contributes nothing.
    assert!(!out.report.deltas.contains_key(&FreqKey::from_mhz(537.0)));
    assert!(out.report.vanished.is_empty());
    assert!(out.state.previous_snapshot.contains(FreqKey::from_mhz(537.0)));
}

#[test]
fn scenario_renumbered_channel_matched_by_frequency() {
    let cfg = ReconcileConfig::default();
    let mut a = ch(507.0, 10, 0);
    a.channel_id = 1;
    let prior = EngineState::seeded(ChannelSnapshot::from_readings(vec![a], 1_000, 900), 900);

    let mut b = ch(507.0, 15, 0);
    b.channel_id = 23;
    let out = reconcile(&cfg, Some(prior), ChannelSnapshot::from_readings(vec![b], 1_015, 915), 915);

    assert!(out.report.vanished.is_empty());
    assert_eq!(out.report.deltas.len(), 1);
    assert_eq!(
        out.report.deltas.get(&FreqKey::from_mhz(507.0)),
        Some(&ErrorDelta::new(5, 0))
    );
}
