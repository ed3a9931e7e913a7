//! Global re-sort of the master dataset.
//!
//! The whole file is read, sorted by `(scan_id, timestamp_utc, trade_type,
//! row_num)` and rewritten. This is a full rewrite rather than an incremental
//! merge, which is fine at batch scale but grows linearly with the dataset.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use std::cmp::Ordering;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use super::reader::read_records;
use super::{ExtractedRecord, CSV_HEADER};

/// Canonical timestamp form written back to the dataset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a capture timestamp. Accepts a space or `T` separator, optional
/// fractional seconds, and RFC 3339 offsets (normalized to UTC).
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Valid timestamps first in chronological order, unparseable ones after.
fn compare_timestamps(a: &Option<NaiveDateTime>, b: &Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts records by the composite key and canonicalizes their timestamps.
///
/// The sort is stable, so rows with equal keys keep their file order.
/// Unparseable timestamps keep their original text.
pub fn sort_records(records: Vec<ExtractedRecord>) -> Vec<ExtractedRecord> {
    let mut keyed: Vec<(Option<NaiveDateTime>, ExtractedRecord)> = records
        .into_iter()
        .map(|r| (parse_timestamp(&r.timestamp_utc), r))
        .collect();

    keyed.sort_by(|(ts_a, a), (ts_b, b)| {
        a.scan_id
            .cmp(&b.scan_id)
            .then_with(|| compare_timestamps(ts_a, ts_b))
            .then_with(|| a.trade_type.cmp(&b.trade_type))
            .then_with(|| a.row_num.cmp(&b.row_num))
    });

    keyed
        .into_iter()
        .map(|(ts, mut record)| {
            if let Some(ts) = ts {
                record.timestamp_utc = ts.format(TIMESTAMP_FORMAT).to_string();
            }
            record
        })
        .collect()
}

/// Re-sorts the dataset file in place. Returns the number of rows written.
///
/// The sorted rows go to a temporary file in the same directory, which then
/// replaces the dataset, so an interrupted sort leaves the old file intact.
pub fn sort_dataset(path: &Path) -> Result<usize> {
    let records = sort_records(read_records(path)?);

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        writeln!(writer, "{}", CSV_HEADER).context("Failed to write CSV header")?;
        for record in &records {
            writeln!(writer, "{}", record.to_csv_line()).context("Failed to write CSV row")?;
        }
        writer.flush().context("Failed to flush sorted CSV")?;
    }

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(records.len())
}
