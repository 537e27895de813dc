//! Command handlers for the `cmw` binary.
//!
//! Shared argument groups and config loading live here.

pub mod errors;
pub mod monitor;

use anyhow::{Context, Result};
use clap::Args;
use cmw_config::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig, MonitorConfig};
use std::path::PathBuf;
use tracing::info;

/// Flags shared by `run` and `once`.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Layered config paths in merge order. Defaults apply when omitted.
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// State file (overrides output.state_file)
    #[arg(short = 'd', long)]
    pub datafile: Option<PathBuf>,

    /// File whose first line is the modem password
    #[arg(short = 'p', long)]
    pub passfile: Option<PathBuf>,
}

/// Flags for commands that only read the state file.
#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    /// Layered config paths in merge order. Defaults apply when omitted.
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// State file (overrides output.state_file)
    #[arg(short = 'd', long)]
    pub datafile: Option<PathBuf>,
}

/// Merge and validate the layered config; the hash is logged for traceability.
pub fn load_config(paths: &[String]) -> Result<(LoadedConfig, MonitorConfig)> {
    let loaded = if paths.is_empty() {
        load_layered_yaml_from_strings(&[])?
    } else {
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        load_layered_yaml(&refs)?
    };
    let cfg = loaded.monitor().context("invalid monitor config")?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
    Ok((loaded, cfg))
}

pub fn state_path(cfg: &MonitorConfig, datafile: Option<&PathBuf>) -> PathBuf {
    datafile
        .cloned()
        .unwrap_or_else(|| PathBuf::from(&cfg.output.state_file))
}
