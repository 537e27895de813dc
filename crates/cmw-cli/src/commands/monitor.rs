use super::{load_config, state_path, MonitorArgs};
use anyhow::{Context, Result};
use cmw_config::resolve_password;
use cmw_engine::iso_utc;
use cmw_report::CsvSink;
use cmw_runtime::{CircuitBreaker, PollOutcome, PollSettings, Poller};
use cmw_source::NetgearSource;
use cmw_state::StateStore;
use std::time::Instant;
use tracing::{error, info};

fn build_poller(args: &MonitorArgs) -> Result<Poller<NetgearSource>> {
    let (_loaded, cfg) = load_config(&args.config_paths)?;

    let password = resolve_password(&cfg.device, args.passfile.as_deref())?;
    let source = NetgearSource::from_config(&cfg.device, password)
        .context("build modem http client failed")?;
    let sink = CsvSink::open(
        &cfg.output.csv_dir,
        cfg.output.downstream_columns,
        cfg.output.upstream_columns,
    )?;
    let store = StateStore::new(state_path(&cfg, args.datafile.as_ref()));

    info!(
        base_url = %cfg.device.base_url,
        model = %cfg.device.model,
        state_file = %store.path().display(),
        csv_dir = %sink.dir().display(),
        "monitor configured"
    );

    Ok(Poller::new(
        source,
        store,
        sink,
        PollSettings::from_config(&cfg),
        CircuitBreaker::from_config(&cfg.poll.breaker),
    ))
}

pub async fn run(args: &MonitorArgs) -> Result<()> {
    let mut poller = build_poller(args)?;
    poller
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("ctrl-c handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

pub async fn once(args: &MonitorArgs) -> Result<()> {
    let mut poller = build_poller(args)?;
    match poller.poll_once(Instant::now()).await? {
        PollOutcome::Reconciled { report, warnings } => {
            println!(
                "system_time={} first_run={} reboot={} counter_reset={} new_error_channels={} vanished={} signal_warnings={}",
                iso_utc(report.system_time),
                report.first_run,
                report.reboot.is_some(),
                report.counter_reset.is_some(),
                report.new_errors().count(),
                report.vanished.len(),
                warnings.len()
            );
        }
        PollOutcome::Skipped { retry_in } => {
            println!("skipped retry_in_secs={}", retry_in.as_secs());
        }
    }
    Ok(())
}
