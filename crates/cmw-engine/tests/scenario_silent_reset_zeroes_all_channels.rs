use cmw_engine::*;

fn ch(mhz: f64, corr: u64, uncorr: u64) -> ChannelReading {
    ChannelReading {
        channel_id: 9,
        status: LockStatus::Locked,
        modulation: "QAM256".to_string(),
        frequency_mhz: mhz,
        power_dbmv: 0.5,
        snr_db: 41.0,
        unerrored_codewords: 77,
        correctable_codewords: corr,
        uncorrectable_codewords: uncorr,
    }
}

#[test]
fn scenario_negative_delta_resets_every_baseline_channel() {
    let cfg = ReconcileConfig::default();
    let old = ChannelSnapshot::from_readings(
        vec![ch(507.0, 100, 10), ch(513.0, 50, 5), ch(519.0, 30, 0)],
        5_000,
        4_000,
    );
    let prior = EngineState::seeded(old, 4_000);

    // Uptime keeps climbing (same boot time) but 513 went backwards.
    let new = ChannelSnapshot::from_readings(
        vec![ch(507.0, 104, 10), ch(513.0, 2, 0), ch(519.0, 30, 0)],
        5_015,
        4_015,
    );
    let out = reconcile(&cfg, Some(prior), new, 4_015);

    assert!(out.report.reboot.is_none());
    let reset = out.report.counter_reset.expect("reset must be reported");
    assert_eq!(reset.freq, FreqKey::from_mhz(513.0));
    assert_eq!(reset.delta, ErrorDelta::new(-48, -5));

    // Every channel is measured against zero, including the ones that did not go backwards.
    let d = &out.report.deltas;
    assert_eq!(d.get(&FreqKey::from_mhz(507.0)), Some(&ErrorDelta::new(104, 10)));
    assert_eq!(d.get(&FreqKey::from_mhz(513.0)), Some(&ErrorDelta::new(2, 0)));
    assert_eq!(d.get(&FreqKey::from_mhz(519.0)), Some(&ErrorDelta::new(30, 0)));
    assert!(d.values().all(|delta| !delta.is_negative()));
    assert!(out.report.logged);
}

#[test]
fn scenario_uncorrectable_decrease_alone_triggers_reset() {
    let cfg = ReconcileConfig::default();
    let old = ChannelSnapshot::from_readings(vec![ch(507.0, 10, 9)], 5_000, 4_000);
    let prior = EngineState::seeded(old, 4_000);

    let new = ChannelSnapshot::from_readings(vec![ch(507.0, 11, 1)], 5_015, 4_015);
    let out = reconcile(&cfg, Some(prior), new, 4_015);

    assert!(out.report.counter_reset.is_some());
    assert_eq!(
        out.report.deltas.get(&FreqKey::from_mhz(507.0)),
        Some(&ErrorDelta::new(11, 1))
    );
}

#[test]
fn scenario_zero_after_reset_yields_no_delta() {
    let cfg = ReconcileConfig::default();
    let old = ChannelSnapshot::from_readings(vec![ch(507.0, 10, 0), ch(513.0, 0, 0)], 5_000, 4_000);
    let prior = EngineState::seeded(old, 4_000);

    let new = ChannelSnapshot::from_readings(vec![ch(507.0, 0, 0), ch(513.0, 0, 0)], 5_015, 4_015);
    let out = reconcile(&cfg, Some(prior), new, 4_015);

    assert!(out.report.counter_reset.is_some());
    assert!(out.report.deltas.is_empty());
    assert!(!out.report.logged);
    assert!(out.state.error_log.is_empty());
}
