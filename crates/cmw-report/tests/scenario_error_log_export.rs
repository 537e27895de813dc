//! Error log rendering for the `errors` command.

use cmw_engine::{ChannelSnapshot, DeltaSet, EngineState, ErrorDelta, FreqKey};
use cmw_report::write_error_log;

#[test]
fn rows_are_time_then_frequency_ordered() {
    let mut st = EngineState::seeded(ChannelSnapshot::empty(0, 0), 0);
    let mut later = DeltaSet::new();
    later.insert(FreqKey::from_khz(513_000), ErrorDelta::new(4, 1));
    later.insert(FreqKey::from_khz(507_000), ErrorDelta::new(2, 0));
    st.error_log.insert(1_600_000_900, later);
    let mut earlier = DeltaSet::new();
    earlier.insert(FreqKey::from_khz(519_250), ErrorDelta::new(0, 0));
    st.error_log.insert(1_600_000_000, earlier);

    let mut out = Vec::new();
    write_error_log(&st, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(
        text,
        "Date,Frequency [MHz],Correctable,Uncorrectable\n\
         2020-09-13T12:26:40Z,519.250,0,0\n\
         2020-09-13T12:41:40Z,507.000,2,0\n\
         2020-09-13T12:41:40Z,513.000,4,1\n"
    );
}

#[test]
fn totals_sum_every_poll() {
    let mut st = EngineState::seeded(ChannelSnapshot::empty(0, 0), 0);
    for (ts, c) in [(100, 2), (115, 3)] {
        let mut d = DeltaSet::new();
        d.insert(FreqKey::from_khz(507_000), ErrorDelta::new(c, 1));
        st.error_log.insert(ts, d);
    }

    let mut out = Vec::new();
    cmw_report::write_error_totals(&st, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Frequency [MHz],Correctable,Uncorrectable\n507.000,5,2\n"
    );
}
