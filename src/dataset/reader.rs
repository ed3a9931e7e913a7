//! CSV reader for the master dataset.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{split_line, ExtractedRecord, COLUMN_COUNT};

/// Parses an integer column, accepting integral floats such as `3400.0`
/// written by older tooling.
fn parse_integer(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

fn parse_optional_integer(text: &str, column: &str) -> Result<Option<i64>> {
    if text.is_empty() {
        return Ok(None);
    }
    parse_integer(text)
        .map(Some)
        .ok_or_else(|| anyhow!("Invalid {} '{}'", column, text))
}

/// Parse a single CSV line into a record.
fn parse_line(line: &str) -> Result<ExtractedRecord> {
    let parts = split_line(line);

    if parts.len() != COLUMN_COUNT {
        return Err(anyhow!(
            "Expected {} columns, got {}",
            COLUMN_COUNT,
            parts.len()
        ));
    }

    let scan_id = parse_integer(&parts[0])
        .ok_or_else(|| anyhow!("Invalid scan_id '{}'", parts[0]))?;
    let row_num = parts[6]
        .parse::<u32>()
        .with_context(|| format!("Invalid row_num '{}'", parts[6]))?;
    let ratio = if parts[7].is_empty() {
        None
    } else {
        Some(
            parts[7]
                .parse::<f64>()
                .with_context(|| format!("Invalid ratio '{}'", parts[7]))?,
        )
    };
    let stock = parse_optional_integer(&parts[8], "stock")?;

    Ok(ExtractedRecord {
        scan_id,
        lot_id: parts[1].clone(),
        timestamp_utc: parts[2].clone(),
        currency_want: parts[3].clone(),
        currency_have: parts[4].clone(),
        trade_type: parts[5].clone(),
        row_num,
        ratio,
        stock,
    })
}

/// Loads every record from the dataset.
///
/// Skips the header row and blank lines. Any malformed row is an error:
/// the caller rewrites the whole file from this result, so silently
/// dropping rows would lose data.
pub fn read_records(path: &Path) -> Result<Vec<ExtractedRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read line from CSV")?;

        // Skip header row
        if line_num == 0 {
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        let record = parse_line(&line)
            .with_context(|| format!("Malformed CSV row {}", line_num + 1))?;
        records.push(record);
    }

    Ok(records)
}
