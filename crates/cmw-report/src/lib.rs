//! cmw-report
//!
//! Time-series CSV output for long-term plotting, plus a flat CSV rendering of
//! the accumulated error log.
//!
//! One file per measured quantity. Each file starts with a `Date,ch1..chN`
//! header; each poll appends one row whose first cell is the device time in
//! ISO-8601 UTC and whose remaining cells follow the page's channel order.

use anyhow::{Context, Result};
use cmw_engine::{iso_utc, EngineState};
use cmw_source::DeviceStatus;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DOWN_POWER_FILE: &str = "down_power.csv";
pub const DOWN_SNR_FILE: &str = "down_snr.csv";
pub const DOWN_CORR_FILE: &str = "down_corr.csv";
pub const DOWN_UNCORR_FILE: &str = "down_uncorr.csv";
pub const UP_POWER_FILE: &str = "up_power.csv";

const DOWNSTREAM_FILES: [&str; 4] = [DOWN_POWER_FILE, DOWN_SNR_FILE, DOWN_CORR_FILE, DOWN_UNCORR_FILE];

fn header(columns: usize) -> Vec<String> {
    std::iter::once("Date".to_string())
        .chain((1..=columns).map(|i| format!("ch{i}")))
        .collect()
}

/// `5.1`, `4.0`, `-7.4`: always keeps a fractional digit.
fn fmt_f64(v: f64) -> String {
    format!("{v:?}")
}

fn append_row(path: &Path, row: &[String]) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("open csv for append failed: {}", path.display()))?;
    let mut w = csv::WriterBuilder::new().flexible(true).from_writer(file);
    w.write_record(row)
        .with_context(|| format!("csv write failed: {}", path.display()))?;
    w.flush()
        .with_context(|| format!("csv flush failed: {}", path.display()))?;
    Ok(())
}

/// Appends one row per poll to the five series files.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
    downstream_columns: usize,
    upstream_columns: usize,
}

impl CsvSink {
    /// Create `dir` and any missing series file with its header row.
    /// Existing files are left untouched.
    pub fn open(dir: impl AsRef<Path>, downstream_columns: usize, upstream_columns: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create csv dir failed: {}", dir.display()))?;

        let sink = Self {
            dir,
            downstream_columns,
            upstream_columns,
        };
        for name in DOWNSTREAM_FILES {
            sink.ensure_header(name, downstream_columns)?;
        }
        sink.ensure_header(UP_POWER_FILE, upstream_columns)?;
        Ok(sink)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_header(&self, name: &str, columns: usize) -> Result<()> {
        let path = self.dir.join(name);
        if path.exists() {
            return Ok(());
        }
        append_row(&path, &header(columns))?;
        debug!(path = %path.display(), columns, "created csv series file");
        Ok(())
    }

    /// Append one row to each series file.
    pub fn append(&self, status: &DeviceStatus) -> Result<()> {
        if status.downstream.len() > self.downstream_columns {
            warn!(
                channels = status.downstream.len(),
                columns = self.downstream_columns,
                "more downstream channels than csv columns"
            );
        }
        if status.upstream.len() > self.upstream_columns {
            warn!(
                channels = status.upstream.len(),
                columns = self.upstream_columns,
                "more upstream channels than csv columns"
            );
        }

        let stamp = iso_utc(status.system_time);
        let row = |cells: Vec<String>| -> Vec<String> {
            std::iter::once(stamp.clone()).chain(cells).collect()
        };

        let ds = &status.downstream;
        append_row(
            &self.dir.join(DOWN_POWER_FILE),
            &row(ds.iter().map(|c| fmt_f64(c.power_dbmv)).collect()),
        )?;
        append_row(
            &self.dir.join(DOWN_SNR_FILE),
            &row(ds.iter().map(|c| fmt_f64(c.snr_db)).collect()),
        )?;
        append_row(
            &self.dir.join(DOWN_CORR_FILE),
            &row(ds.iter().map(|c| c.correctable_codewords.to_string()).collect()),
        )?;
        append_row(
            &self.dir.join(DOWN_UNCORR_FILE),
            &row(ds.iter().map(|c| c.uncorrectable_codewords.to_string()).collect()),
        )?;
        append_row(
            &self.dir.join(UP_POWER_FILE),
            &row(status.upstream.iter().map(|c| fmt_f64(c.power_dbmv)).collect()),
        )?;
        Ok(())
    }
}

/// Render the error log as `Date,Frequency [MHz],Correctable,Uncorrectable`
/// rows, oldest first.
pub fn write_error_log<W: Write>(state: &EngineState, out: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(["Date", "Frequency [MHz]", "Correctable", "Uncorrectable"])
        .context("csv write failed")?;
    for (ts, deltas) in &state.error_log {
        let stamp = iso_utc(*ts);
        for (freq, d) in deltas {
            w.write_record([
                stamp.clone(),
                format!("{:.3}", freq.as_mhz()),
                d.correctable.to_string(),
                d.uncorrectable.to_string(),
            ])
            .context("csv write failed")?;
        }
    }
    w.flush().context("csv flush failed")?;
    Ok(())
}

/// Render per-frequency totals of the error log as
/// `Frequency [MHz],Correctable,Uncorrectable` rows.
pub fn write_error_totals<W: Write>(state: &EngineState, out: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(["Frequency [MHz]", "Correctable", "Uncorrectable"])
        .context("csv write failed")?;
    for (freq, d) in state.error_totals() {
        w.write_record([
            format!("{:.3}", freq.as_mhz()),
            d.correctable.to_string(),
            d.uncorrectable.to_string(),
        ])
        .context("csv write failed")?;
    }
    w.flush().context("csv flush failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_numbers_channels_from_one() {
        assert_eq!(header(3), vec!["Date", "ch1", "ch2", "ch3"]);
    }

    #[test]
    fn floats_keep_fraction() {
        assert_eq!(fmt_f64(4.0), "4.0");
        assert_eq!(fmt_f64(-7.4), "-7.4");
    }
}
