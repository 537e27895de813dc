//! cmw-config
//!
//! Layered YAML configuration for the monitor.
//!
//! - Documents merge left to right; later layers override earlier ones.
//! - The merged document is canonicalized (sorted keys, compact) and hashed
//!   with SHA-256 so a run can be tied to the exact config it used.
//! - The modem password never lives in YAML. Only the NAME of the env var
//!   holding it does (`device.password_env`); see [`resolve_password`].

mod monitor;
mod secrets;

pub use monitor::{
    BreakerConfig, DeviceConfig, EngineConfig, MonitorConfig, OutputConfig, PollConfig,
    RetryConfig, ThresholdConfig,
};
pub use secrets::{resolve_password, DevicePassword};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;

/// Key names that would hold a credential in clear text, at any depth.
const CREDENTIAL_KEYS: &[&str] = &["password", "passwd", "pass", "pwd", "secret", "passphrase"];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the merged document. Absent keys take their defaults.
    pub fn monitor(&self) -> Result<MonitorConfig> {
        let cfg: MonitorConfig = serde_json::from_value(self.config_json.clone())
            .context("config does not match the monitor schema")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        if v_json.is_null() {
            // empty document
            continue;
        }
        if !v_json.is_object() {
            bail!("config layer must be a YAML mapping");
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sorted(&map[k.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sorted(v)).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    if let Some(ptr) = find_credential_key(v, "") {
        bail!(
            "CONFIG_SECRET_DETECTED leaf={} value=REDACTED (use device.password_env or --passfile)",
            ptr
        );
    }

    // A pasted password in place of the env var name.
    if let Some(name) = v.pointer("/device/password_env").and_then(Value::as_str) {
        if !is_env_var_name(name) {
            bail!("CONFIG_SECRET_DETECTED leaf=/device/password_env value=REDACTED (expected an env var name)");
        }
    }
    Ok(())
}

fn is_credential_key(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    CREDENTIAL_KEYS.iter().any(|c| k == *c || k.ends_with(&format!("_{c}")))
}

/// JSON pointer of the first credential-named key, depth first.
fn find_credential_key(v: &Value, prefix: &str) -> Option<String> {
    match v {
        Value::Object(map) => map.iter().find_map(|(k, vv)| {
            let ptr = format!("{}/{}", prefix, escape_pointer_token(k));
            if is_credential_key(k) {
                Some(ptr)
            } else {
                find_credential_key(vv, &ptr)
            }
        }),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .find_map(|(i, vv)| find_credential_key(vv, &format!("{prefix}/{i}"))),
        _ => None,
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn is_env_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
