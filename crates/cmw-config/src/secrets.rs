//! Modem password resolution.
//!
//! # Contract
//! - YAML stores only the env var NAME (`device.password_env`).
//! - `--passfile` wins over the env var; the first line is the password.
//! - `Debug` on [`DevicePassword`] never prints the value.
//! - Error messages reference the env var NAME or file path, never the value.

use crate::DeviceConfig;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Resolved modem password. **Redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub struct DevicePassword(String);

impl DevicePassword {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DevicePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DevicePassword(<REDACTED>)")
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn read_passfile(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read passfile: {}", path.display()))?;
    let first = raw.lines().next().unwrap_or("");
    if first.is_empty() {
        bail!("passfile is empty: {}", path.display());
    }
    Ok(first.to_string())
}

/// Resolve the modem password from `passfile` or the env var named by
/// `device.password_env`.
pub fn resolve_password(device: &DeviceConfig, passfile: Option<&Path>) -> Result<DevicePassword> {
    if let Some(path) = passfile {
        return read_passfile(path).map(DevicePassword);
    }
    match resolve_env(&device.password_env) {
        Some(v) => Ok(DevicePassword(v)),
        None => bail!(
            "SECRET_MISSING: env var {} is unset or empty (set it or pass --passfile)",
            device.password_env
        ),
    }
}
