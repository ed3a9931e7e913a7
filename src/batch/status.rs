//! Per-lot status ledger.
//!
//! Every screenshot a batch touches ends with exactly one terminal status,
//! appended here so no input disappears or stalls without a trace.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dataset::escape_field;
use crate::dataset::sort::TIMESTAMP_FORMAT;

const STATUS_HEADER: &str = "processed_at,lot_id,screenshot,status,records,detail";

/// Terminal status of one screenshot within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotStatus {
    /// At least one row extracted; archived
    Done,
    /// Sidecar present but no row parsed; archived
    Empty,
    /// Sidecar missing or unreadable; quarantined
    NoMetadata,
    /// Image unreadable or worker fault; left in place for the next run
    Error,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Done => "done",
            LotStatus::Empty => "empty",
            LotStatus::NoMetadata => "no_metadata",
            LotStatus::Error => "error",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub lot_id: String,
    pub screenshot: String,
    pub status: LotStatus,
    pub records: usize,
    pub detail: String,
}

/// Appends entries to the ledger, writing the header if the file is new.
pub fn append_status(path: &Path, entries: &[StatusEntry]) -> Result<()> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open status log {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if is_new {
        writeln!(writer, "{}", STATUS_HEADER).context("Failed to write status header")?;
    }

    let processed_at = Utc::now().format(TIMESTAMP_FORMAT).to_string();
    for entry in entries {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            processed_at,
            escape_field(&entry.lot_id),
            escape_field(&entry.screenshot),
            entry.status,
            entry.records,
            escape_field(&entry.detail)
        )
        .context("Failed to write status row")?;
    }
    writer.flush().context("Failed to flush status log")?;

    Ok(())
}
