//! CSV writer for the master dataset.
//!
//! Appends in one open-append-close cycle per batch. Rows from earlier
//! batches are never rewritten here; global order is restored by `sort`.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{ExtractedRecord, CSV_HEADER};

/// True if the file exists and has at least one line.
fn has_content(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let file = File::open(path).context("Failed to open existing CSV")?;
    let reader = BufReader::new(file);
    Ok(reader.lines().next().is_some())
}

/// Appends records to the dataset, writing the header first if the file is new or empty.
pub fn append_records(path: &Path, records: &[ExtractedRecord]) -> Result<()> {
    let needs_header = !has_content(path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for append", path.display()))?;
    let mut writer = BufWriter::new(file);

    if needs_header {
        writeln!(writer, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    }
    for record in records {
        writeln!(writer, "{}", record.to_csv_line()).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample_record;
    use tempfile::tempdir;

    #[test]
    fn test_append_creates_header() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("market_data.csv");

        append_records(&csv_path, &[sample_record(1, "2025-01-01 00:00:00", "sell", 1)]).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2); // header + 1 data row
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,lot-1,"));
    }

    #[test]
    fn test_append_preserves_existing() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("market_data.csv");

        for scan in 1..=3 {
            let record = sample_record(scan, "2025-01-01 00:00:00", "buy", 1);
            append_records(&csv_path, &[record]).unwrap();
        }

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4); // header + 3 data rows
        assert_eq!(lines.iter().filter(|l| **l == CSV_HEADER).count(), 1);
    }

    #[test]
    fn test_append_to_empty_file_writes_header() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("market_data.csv");
        std::fs::write(&csv_path, "").unwrap();

        append_records(&csv_path, &[sample_record(2, "2025-01-01 00:00:00", "buy", 1)]).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with(CSV_HEADER));
    }
}
