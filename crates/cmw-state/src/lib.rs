//! cmw-state
//!
//! Persistent State Store for the reconciliation engine.
//!
//! Contract:
//! - One JSON file, overwritten atomically (temp file + rename) after each poll.
//! - Absent file => first run (`None`), never an error.
//! - Corrupt file or unknown schema version => logged, treated as first run.
//! - The older positional-tuple file layout is still readable.

mod legacy;

use anyhow::{bail, Context, Result};
use cmw_engine::{ChannelSnapshot, DeltaSet, EngineState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current on-disk schema version.
pub const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct StateRecordRef<'a> {
    version: u32,
    previous_snapshot: &'a ChannelSnapshot,
    error_log: &'a BTreeMap<i64, DeltaSet>,
    previous_boot_time: i64,
    previous_uptime: i64,
}

#[derive(Deserialize)]
struct StateRecord {
    previous_snapshot: ChannelSnapshot,
    #[serde(default)]
    error_log: BTreeMap<i64, DeltaSet>,
    previous_boot_time: i64,
    previous_uptime: i64,
}

/// Serialize engine state to the versioned JSON record.
pub fn encode_state(state: &EngineState) -> Result<String> {
    let rec = StateRecordRef {
        version: STATE_SCHEMA_VERSION,
        previous_snapshot: &state.previous_snapshot,
        error_log: &state.error_log,
        previous_boot_time: state.previous_boot_time,
        previous_uptime: state.previous_uptime,
    };
    serde_json::to_string_pretty(&rec).context("serialize engine state failed")
}

/// Parse either the versioned record or the legacy positional tuple.
pub fn decode_state(raw: &str) -> Result<EngineState> {
    let v: Value = serde_json::from_str(raw).context("state file is not valid JSON")?;
    if v.is_array() {
        return legacy::decode_legacy_tuple(v);
    }
    if !v.is_object() {
        bail!("state file must contain a JSON object or array");
    }

    let version = v.get("version").and_then(Value::as_u64);
    if version != Some(u64::from(STATE_SCHEMA_VERSION)) {
        bail!(
            "unsupported state schema version {:?} (expected {})",
            version,
            STATE_SCHEMA_VERSION
        );
    }
    let rec: StateRecord = serde_json::from_value(v).context("state record decode failed")?;
    Ok(EngineState {
        previous_snapshot: rec.previous_snapshot,
        previous_boot_time: rec.previous_boot_time,
        previous_uptime: rec.previous_uptime,
        error_log: rec.error_log,
    })
}

/// File-backed store for a single device's [`EngineState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load: `Ok(None)` only when the file does not exist.
    pub fn try_load(&self) -> Result<Option<EngineState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read state file failed: {}", self.path.display()))
            }
        };
        let state = decode_state(&raw)
            .with_context(|| format!("decode state file failed: {}", self.path.display()))?;
        Ok(Some(state))
    }

    /// Lenient load used at startup: any failure means "no prior state".
    pub fn load(&self) -> Option<EngineState> {
        match self.try_load() {
            Ok(Some(state)) => {
                debug!(
                    path = %self.path.display(),
                    channels = state.previous_snapshot.len(),
                    log_entries = state.error_log.len(),
                    previous_boot_time = state.previous_boot_time,
                    previous_uptime = state.previous_uptime,
                    "recovered engine state"
                );
                Some(state)
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no state file; starting from a fresh baseline");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring unusable state file: {e:#}");
                None
            }
        }
    }

    /// Atomically replace the state file.
    pub fn save(&self, state: &EngineState) -> Result<()> {
        let json = encode_state(state)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("create state dir failed: {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp state file failed in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.write_all(b"\n"))
            .context("write temp state file failed")?;
        tmp.as_file().sync_all().context("sync temp state file failed")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replace state file failed: {}", self.path.display()))?;
        Ok(())
    }
}
