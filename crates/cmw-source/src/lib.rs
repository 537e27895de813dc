//! cmw-source
//!
//! Snapshot acquisition from the modem's status page.
//!
//! This crate owns the source abstraction and the Netgear adapter. It does not
//! reconcile or persist; callers hand the returned [`DeviceStatus`] to the
//! engine and the report sink.

mod netgear;
mod parse;

pub use netgear::NetgearSource;
pub use parse::{extract_web_token, parse_uptime, StatusPageParser};

use cmw_engine::{ChannelReading, ChannelSnapshot, UpstreamReading};
use std::fmt;

/// One parsed status page.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Locked downstream channels in page order.
    pub downstream: Vec<ChannelReading>,
    /// Locked upstream channels in page order.
    pub upstream: Vec<UpstreamReading>,
    /// Device clock, epoch seconds.
    pub system_time: i64,
    pub uptime_secs: i64,
}

impl DeviceStatus {
    pub fn boot_time(&self) -> i64 {
        self.system_time.saturating_sub(self.uptime_secs)
    }

    /// Frequency-keyed snapshot for the reconciliation engine.
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot::from_readings(self.downstream.iter().cloned(), self.system_time, self.uptime_secs)
    }
}

/// Errors a [`SnapshotSource`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connection, DNS or timeout failure.
    Transport(String),
    /// Non-success HTTP status.
    Http { status: u16, url: String },
    /// Login handshake failed or credentials were rejected.
    Login(String),
    /// The page did not contain the expected tables or cells.
    Parse(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Http { status, url } => write!(f, "http error status={status} url={url}"),
            SourceError::Login(msg) => write!(f, "login error: {msg}"),
            SourceError::Parse(msg) => write!(f, "status page parse error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Device status provider contract.
///
/// Object safe; implementations must be `Send + Sync` to cross task boundaries.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short name used in log lines (e.g. `"netgear"`).
    fn name(&self) -> &str;

    /// One complete acquisition: login if needed, fetch, parse.
    async fn fetch_status(&self) -> Result<DeviceStatus, SourceError>;
}
