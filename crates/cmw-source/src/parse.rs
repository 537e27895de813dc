//! Status page scraping.
//!
//! The DOCSIS status page carries two tables (`dsTable`, `usTable`) whose
//! first row is column titles, plus two cells holding the device clock and
//! the uptime. Numeric cells carry units (`"507000000 Hz"`, `"5.1 dBmV"`) and
//! may use thousands separators.

use crate::{DeviceStatus, SourceError};
use chrono::{FixedOffset, Local, NaiveDateTime, TimeZone};
use cmw_engine::{ChannelReading, LockStatus, UpstreamReading};
use regex::Regex;

const HZ_PER_MHZ: f64 = 1e6;
const DOWNSTREAM_CELLS: usize = 10;
const UPSTREAM_CELLS: usize = 6;
const SYSTEM_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Scraper for the `DocsisStatus.asp` page. Patterns are compiled once.
#[derive(Debug, Clone)]
pub struct StatusPageParser {
    row: Regex,
    cell: Regex,
    tag: Regex,
    number: Regex,
    ds_table: Regex,
    us_table: Regex,
    system_time_cell: Regex,
    uptime_cell: Regex,
    /// `None` interprets the device clock in the host's local zone.
    utc_offset: Option<FixedOffset>,
}

fn compile(pattern: &str) -> Result<Regex, SourceError> {
    Regex::new(pattern).map_err(|e| SourceError::Parse(format!("invalid pattern {pattern:?}: {e}")))
}

fn element_by_id(tag: &str, id: &str) -> String {
    format!(
        r#"(?is)<{tag}\b[^>]*\bid\s*=\s*["']?{}["']?[^>]*>(.*?)</{tag}\s*>"#,
        regex::escape(id)
    )
}

impl StatusPageParser {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            row: compile(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>")?,
            cell: compile(r"(?is)<td\b[^>]*>(.*?)</td\s*>")?,
            tag: compile(r"(?s)<[^>]*>")?,
            number: compile(r"[-+]?\.?\d+(?:,\d\d\d)*\.?\d*(?:[eE][-+]?\d+)?")?,
            ds_table: compile(&element_by_id("table", "dsTable"))?,
            us_table: compile(&element_by_id("table", "usTable"))?,
            system_time_cell: compile(&element_by_id("td", "Current_systemtime"))?,
            uptime_cell: compile(&element_by_id("td", "SystemUpTime"))?,
            utc_offset: None,
        })
    }

    /// Interpret the device clock at a fixed offset instead of host local time.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    pub fn parse(&self, html: &str) -> Result<DeviceStatus, SourceError> {
        let ds = self
            .ds_table
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| SourceError::Parse("downstream table dsTable not found".to_string()))?;
        let downstream = self.parse_downstream(ds.as_str())?;

        // Some firmware omits the upstream table while ranging.
        let upstream = match self.us_table.captures(html).and_then(|c| c.get(1)) {
            Some(us) => self.parse_upstream(us.as_str())?,
            None => Vec::new(),
        };

        let system_time_text = self.labelled_cell(&self.system_time_cell, html, "Current_systemtime")?;
        let system_time = self.parse_system_time(&system_time_text)?;
        let uptime_text = self.labelled_cell(&self.uptime_cell, html, "SystemUpTime")?;
        let uptime_secs = parse_uptime(&uptime_text)
            .ok_or_else(|| SourceError::Parse(format!("unrecognised uptime {uptime_text:?}")))?;

        Ok(DeviceStatus {
            downstream,
            upstream,
            system_time,
            uptime_secs,
        })
    }

    fn text(&self, html: &str) -> String {
        let stripped = self.tag.replace_all(html, " ");
        stripped
            .replace("&nbsp;", " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Data rows of a table as cell texts, title row dropped.
    fn rows(&self, table_html: &str) -> Vec<Vec<String>> {
        self.row
            .captures_iter(table_html)
            .skip(1)
            .filter_map(|r| r.get(1))
            .map(|r| {
                self.cell
                    .captures_iter(r.as_str())
                    .filter_map(|c| c.get(1))
                    .map(|c| self.text(c.as_str()))
                    .collect()
            })
            .collect()
    }

    fn first_number(&self, cell: &str, what: &str) -> Result<f64, SourceError> {
        let m = self
            .number
            .find(cell)
            .ok_or_else(|| SourceError::Parse(format!("{what}: no number in {cell:?}")))?;
        m.as_str()
            .replace(',', "")
            .parse::<f64>()
            .map_err(|e| SourceError::Parse(format!("{what}: {cell:?}: {e}")))
    }

    fn integer(&self, cell: &str, what: &str) -> Result<u64, SourceError> {
        let m = self
            .number
            .find(cell)
            .ok_or_else(|| SourceError::Parse(format!("{what}: no number in {cell:?}")))?;
        m.as_str()
            .replace(',', "")
            .parse::<u64>()
            .map_err(|e| SourceError::Parse(format!("{what}: {cell:?}: {e}")))
    }

    fn channel_id(&self, cell: &str, what: &str) -> Result<u32, SourceError> {
        let v = self.integer(cell, what)?;
        u32::try_from(v).map_err(|_| SourceError::Parse(format!("{what}: {v} out of range")))
    }

    fn parse_downstream(&self, table: &str) -> Result<Vec<ChannelReading>, SourceError> {
        let mut out = Vec::new();
        for cells in self.rows(table) {
            if cells.is_empty() {
                continue;
            }
            if cells.len() < DOWNSTREAM_CELLS {
                return Err(SourceError::Parse(format!(
                    "downstream row has {} cells, expected {DOWNSTREAM_CELLS}",
                    cells.len()
                )));
            }
            let status = LockStatus::parse(&cells[1]);
            if status == LockStatus::NotLocked {
                continue;
            }
            out.push(ChannelReading {
                channel_id: self.channel_id(&cells[3], "downstream channel id")?,
                status,
                modulation: cells[2].clone(),
                frequency_mhz: self.first_number(&cells[4], "downstream frequency")? / HZ_PER_MHZ,
                power_dbmv: self.first_number(&cells[5], "downstream power")?,
                snr_db: self.first_number(&cells[6], "downstream snr")?,
                unerrored_codewords: self.integer(&cells[7], "unerrored codewords")?,
                correctable_codewords: self.integer(&cells[8], "correctable codewords")?,
                uncorrectable_codewords: self.integer(&cells[9], "uncorrectable codewords")?,
            });
        }
        Ok(out)
    }

    fn parse_upstream(&self, table: &str) -> Result<Vec<UpstreamReading>, SourceError> {
        let mut out = Vec::new();
        for cells in self.rows(table) {
            if cells.is_empty() {
                continue;
            }
            if cells.len() < UPSTREAM_CELLS {
                return Err(SourceError::Parse(format!(
                    "upstream row has {} cells, expected {UPSTREAM_CELLS}",
                    cells.len()
                )));
            }
            let status = LockStatus::parse(&cells[1]);
            if status == LockStatus::NotLocked {
                continue;
            }
            out.push(UpstreamReading {
                channel_id: self.channel_id(&cells[3], "upstream channel id")?,
                status,
                channel_type: cells[2].clone(),
                frequency_mhz: self.first_number(&cells[4], "upstream frequency")? / HZ_PER_MHZ,
                power_dbmv: self.first_number(&cells[5], "upstream power")?,
            });
        }
        Ok(out)
    }

    /// Text of a `<td id=..>` cell after its bold label.
    fn labelled_cell(&self, re: &Regex, html: &str, id: &str) -> Result<String, SourceError> {
        let inner = re
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| SourceError::Parse(format!("cell {id} not found")))?
            .as_str();
        let lower = inner.to_ascii_lowercase();
        let value = match lower.rfind("</b>") {
            Some(i) => &inner[i + "</b>".len()..],
            None => inner,
        };
        Ok(self.text(value))
    }

    fn parse_system_time(&self, text: &str) -> Result<i64, SourceError> {
        let naive = NaiveDateTime::parse_from_str(text, SYSTEM_TIME_FORMAT)
            .map_err(|e| SourceError::Parse(format!("system time {text:?}: {e}")))?;
        let resolved = match self.utc_offset {
            Some(off) => off.from_local_datetime(&naive).earliest().map(|t| t.timestamp()),
            None => Local.from_local_datetime(&naive).earliest().map(|t| t.timestamp()),
        };
        resolved.ok_or_else(|| SourceError::Parse(format!("system time {text:?} does not exist locally")))
    }
}

/// Parse an uptime such as `"43 days 04h:48m:08s"`, `"1 day, 2:03:04"` or
/// `"04:48:08"` into seconds.
pub fn parse_uptime(text: &str) -> Option<i64> {
    let t = text.trim().to_ascii_lowercase();
    let (days, clock) = match t.find("day") {
        Some(i) => {
            let days: i64 = t[..i].trim().parse().ok()?;
            let rest = t[i..].trim_start_matches("days").trim_start_matches("day");
            (days, rest.trim_start_matches([',', ' ']).to_string())
        }
        None => (0, t),
    };

    let parts: Vec<i64> = clock
        .split(':')
        .map(|p| p.trim().trim_end_matches(['h', 'm', 's']).trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return None,
    };
    if m >= 60 || s >= 60 {
        return None;
    }
    Some(days * 86_400 + h * 3_600 + m * 60 + s)
}

/// `value` of the login form's hidden `webToken` input.
pub fn extract_web_token(html: &str) -> Option<String> {
    let input = Regex::new(r#"(?is)<input\b[^>]*\bname\s*=\s*["']?webToken["']?[^>]*>"#).ok()?;
    let value = Regex::new(r#"(?is)\bvalue\s*=\s*["']([^"']*)["']"#).ok()?;
    let tag = input.find(html)?;
    let token = value.captures(tag.as_str())?.get(1)?.as_str().trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formats() {
        assert_eq!(parse_uptime("04:48:08"), Some(4 * 3600 + 48 * 60 + 8));
        assert_eq!(
            parse_uptime("43 days 04h:48m:08s"),
            Some(43 * 86_400 + 4 * 3600 + 48 * 60 + 8)
        );
        assert_eq!(parse_uptime("1 day, 0:00:05"), Some(86_400 + 5));
        assert_eq!(parse_uptime("00h:01m:02s"), Some(62));
        assert_eq!(parse_uptime("forever"), None);
        assert_eq!(parse_uptime("1:75:00"), None);
    }

    #[test]
    fn web_token_extracted_from_hidden_input() {
        let html = r#"<form><input type="hidden" name="webToken" value="1716812345" /></form>"#;
        assert_eq!(extract_web_token(html).as_deref(), Some("1716812345"));
        assert_eq!(extract_web_token("<form></form>"), None);
    }

    #[test]
    fn numbers_keep_sign_and_drop_separators() {
        let p = StatusPageParser::new().unwrap();
        assert_eq!(p.first_number("-3.2 dBmV", "x").unwrap(), -3.2);
        assert_eq!(p.integer("1,234,567", "x").unwrap(), 1_234_567);
        assert_eq!(p.first_number("507000000 Hz", "x").unwrap(), 507_000_000.0);
        assert!(p.integer("n/a", "x").is_err());
    }

    #[test]
    fn channel_id_must_fit_u32() {
        let p = StatusPageParser::new().unwrap();
        assert_eq!(p.channel_id("32", "x").unwrap(), 32);
        let err = p.channel_id("4294967296", "x").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)), "got: {err:?}");
    }

    #[test]
    fn system_time_at_fixed_offset() {
        let p = StatusPageParser::new()
            .unwrap()
            .with_utc_offset(FixedOffset::east_opt(0).unwrap());
        assert_eq!(p.parse_system_time("Sun Sep 13 12:26:40 2020").unwrap(), 1_600_000_000);
        assert!(p.parse_system_time("yesterday").is_err());
    }

    #[test]
    fn labelled_cell_skips_bold_label() {
        let p = StatusPageParser::new().unwrap();
        let html = r#"<td id="SystemUpTime"><b>System Up Time:</b> 04:48:08</font></td>"#;
        assert_eq!(p.labelled_cell(&p.uptime_cell, html, "SystemUpTime").unwrap(), "04:48:08");
    }
}
