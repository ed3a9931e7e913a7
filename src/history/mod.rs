//! Offline compiler for downloaded currency-pair history.
//!
//! Each input file holds the exchange history of one currency pair. Every
//! history entry becomes one CSV row, with item ids resolved to names via a
//! lookup table.

use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Number;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::dataset::{escape_field, split_line};

const HISTORY_HEADER: &str = "timestamp_utc,c1_item_id,c1_name,c1_relative_price,c1_volume_traded,\
c2_item_id,c2_name,c2_relative_price,c2_volume_traded";

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Default, Deserialize)]
struct PairHistory {
    #[serde(rename = "History", default)]
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryEntry {
    #[serde(rename = "Epoch", default)]
    epoch: Option<f64>,
    #[serde(rename = "Data", default)]
    data: PairData,
}

#[derive(Debug, Default, Deserialize)]
struct PairData {
    #[serde(rename = "CurrencyOneData", default)]
    currency_one: CurrencyData,
    #[serde(rename = "CurrencyTwoData", default)]
    currency_two: CurrencyData,
}

/// Numbers are kept as `Number` so they are written back exactly as received.
#[derive(Debug, Default, Deserialize)]
struct CurrencyData {
    #[serde(rename = "CurrencyItemId", default)]
    item_id: Option<i64>,
    #[serde(rename = "RelativePrice", default)]
    relative_price: Option<Number>,
    #[serde(rename = "VolumeTraded", default)]
    volume_traded: Option<Number>,
}

/// Item id → display name.
pub type ItemNames = HashMap<i64, String>;

/// Totals reported by [`compile_history`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
    pub files_read: usize,
    pub files_failed: usize,
    pub rows_written: usize,
}

/// Loads the item lookup CSV (`itemID` and `name` columns, any order).
pub fn load_item_names(path: &Path) -> Result<ItemNames> {
    let file = File::open(path)
        .with_context(|| format!("Item lookup file not found: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .transpose()
        .context("Failed to read item lookup header")?
        .ok_or_else(|| anyhow!("Item lookup file is empty: {}", path.display()))?;
    let columns = split_line(header.trim_start_matches('\u{feff}'));
    let find = |name: &str| {
        columns
            .iter()
            .position(|c| c.trim() == name)
            .ok_or_else(|| anyhow!("Item lookup file has no '{}' column", name))
    };
    let id_col = find("itemID")?;
    let name_col = find("name")?;

    let mut names = ItemNames::new();
    for (i, line) in lines.enumerate() {
        let line = line.context("Failed to read item lookup row")?;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_line(&line);
        let (Some(id), Some(name)) = (parts.get(id_col), parts.get(name_col)) else {
            return Err(anyhow!("Item lookup row {} is missing columns", i + 2));
        };
        let id = id
            .trim()
            .parse::<i64>()
            .with_context(|| format!("Invalid itemID '{}' on row {}", id, i + 2))?;
        names.insert(id, name.clone());
    }

    Ok(names)
}

/// Renders a Unix epoch (seconds) as `YYYY-MM-DDTHH:MM:SS` UTC.
fn format_epoch(epoch: f64) -> Option<String> {
    if !epoch.is_finite() {
        return None;
    }
    let dt = DateTime::from_timestamp(epoch.floor() as i64, 0)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn currency_fields(data: &CurrencyData, names: &ItemNames) -> [String; 4] {
    let name = data
        .item_id
        .and_then(|id| names.get(&id))
        .map(String::as_str)
        .unwrap_or(UNKNOWN_NAME);
    [
        data.item_id.map(|id| id.to_string()).unwrap_or_default(),
        escape_field(name),
        data.relative_price
            .as_ref()
            .map(Number::to_string)
            .unwrap_or_default(),
        data.volume_traded
            .as_ref()
            .map(Number::to_string)
            .unwrap_or_default(),
    ]
}

/// Converts one history file into CSV lines. Entries without an epoch are skipped.
fn history_rows(contents: &str, names: &ItemNames) -> Result<Vec<String>> {
    let history: PairHistory = serde_json::from_str(contents).context("Invalid history JSON")?;

    let mut rows = Vec::new();
    for entry in &history.history {
        let Some(timestamp) = entry.epoch.and_then(format_epoch) else {
            continue;
        };
        let c1 = currency_fields(&entry.data.currency_one, names);
        let c2 = currency_fields(&entry.data.currency_two, names);
        rows.push(format!("{},{},{}", timestamp, c1.join(","), c2.join(",")));
    }
    Ok(rows)
}

fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("History directory not found: {}", dir.display()));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Compiles every `*.json` history file in `input_dir` into `output_csv`.
///
/// Files that fail to parse are logged and skipped. When no rows result the
/// output file is left untouched.
pub fn compile_history(
    input_dir: &Path,
    output_csv: &Path,
    names: &ItemNames,
) -> Result<HistorySummary> {
    let files = list_json_files(input_dir)?;
    let mut summary = HistorySummary::default();

    if files.is_empty() {
        log::info!("No .json files found in {}", input_dir.display());
        return Ok(summary);
    }
    log::info!("Found {} history files to process", files.len());

    let mut rows = Vec::new();
    for path in &files {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let parsed = fs::read_to_string(path)
            .context("Failed to read file")
            .and_then(|contents| history_rows(&contents, names));
        match parsed {
            Ok(file_rows) => {
                log::debug!("{}: {} entries", name, file_rows.len());
                summary.files_read += 1;
                rows.extend(file_rows);
            }
            Err(e) => {
                log::warn!("Skipping {}: {:#}", name, e);
                summary.files_failed += 1;
            }
        }
    }

    if rows.is_empty() {
        log::info!("No valid history data was processed");
        return Ok(summary);
    }

    let file = File::create(output_csv)
        .with_context(|| format!("Failed to create {}", output_csv.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", HISTORY_HEADER).context("Failed to write CSV header")?;
    for row in &rows {
        writeln!(writer, "{}", row).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush history CSV")?;

    summary.rows_written = rows.len();
    log::info!("Wrote {} rows to {}", rows.len(), output_csv.display());
    Ok(summary)
}
