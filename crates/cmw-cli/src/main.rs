mod commands;
mod logging;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use commands::{MonitorArgs, StateArgs};

#[derive(Parser)]
#[command(name = "cmw")]
#[command(about = "Cable modem signal and error-counter monitor", long_about = None)]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v WARN, -vv INFO, -vvv DEBUG). Default ERROR.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only on the console; nothing on the console with --log.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Append timestamped logs to FILE; the console then shows warnings only.
    #[arg(short = 'l', long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the modem until interrupted
    Run {
        #[command(flatten)]
        args: MonitorArgs,
    },

    /// Poll the modem once and print a summary line
    Once {
        #[command(flatten)]
        args: MonitorArgs,
    },

    /// Print the accumulated new-error log as CSV
    Errors {
        #[command(flatten)]
        args: StateArgs,

        /// Print per-frequency totals instead of every logged poll
        #[arg(long, default_value_t = false)]
        totals: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    if let Err(msg) = logging::check_flags(cli.verbose, cli.quiet, cli.log.is_some()) {
        Cli::command().error(ErrorKind::ArgumentConflict, msg).exit();
    }
    logging::init_tracing(cli.verbose, cli.quiet, cli.log.as_deref())?;

    match cli.cmd {
        Commands::Run { args } => commands::monitor::run(&args).await?,
        Commands::Once { args } => commands::monitor::once(&args).await?,
        Commands::Errors { args, totals } => commands::errors::print(&args, totals)?,
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = cmw_config::load_layered_yaml(&path_refs)?;
            loaded.monitor()?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}
