use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// `-q` silences the console; combined with `-v` it only makes sense when a
/// log file takes the verbose output.
pub fn check_flags(verbose: u8, quiet: bool, has_log_file: bool) -> Result<(), String> {
    if quiet && verbose > 0 && !has_log_file {
        return Err(
            "cannot combine --verbose and --quiet unless using --log (quiet then applies to the console)"
                .to_string(),
        );
    }
    Ok(())
}

/// Level for the primary sink. `-q` never lowers it below ERROR, and without a
/// log file `check_flags` already rejects `-q` with `-v`.
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Console level when a log file takes the chosen level. tracing has nothing
/// above ERROR, so `-q` turns the console off.
pub fn console_level_with_log_file(quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else {
        LevelFilter::WARN
    }
}

fn filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Console-only, or file (timestamped, chosen level) plus console (WARN, or
/// off with `-q`). `RUST_LOG` overrides the chosen level.
pub fn init_tracing(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = level_for(verbose);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file failed: {}", path.display()))?;
            let console_level = console_level_with_log_file(quiet);

            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(filter(level));
            let console_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_filter(console_level);
            tracing_subscriber::registry()
                .with(file_layer)
                .with(console_layer)
                .try_init()
                .context("tracing init failed")?;
        }
        None => {
            let console_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_filter(filter(level));
            tracing_subscriber::registry()
                .with(console_layer)
                .try_init()
                .context("tracing init failed")?;
        }
    }
    Ok(())
}
