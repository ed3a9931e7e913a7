//! Configuration types for batch processing.
//!
//! Two files are read once per run:
//! - the table layout (`ocr_config.json`), which is required, and
//! - the processor settings (`processor.json`), where every field has a default.
//!
//! Both are plain values passed down to the orchestrator and workers.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::resolve;

/// A horizontal pixel band (column) in absolute screenshot coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBand {
    pub x_start: u32,
    pub x_end: u32,
}

/// A vertical pixel band (row) in absolute screenshot coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBand {
    pub y_start: u32,
    pub y_end: u32,
}

/// Column bands shared by every table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub ratio: ColumnBand,
    pub stock: ColumnBand,
}

/// Row bands of one logical table ("buy", "sell", ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub rows: Vec<RowBand>,
}

/// On-disk shape: `columns` plus one entry per table at the top level.
#[derive(Deserialize)]
struct RawLayout {
    columns: ColumnLayout,
    #[serde(flatten)]
    entries: BTreeMap<String, serde_json::Value>,
}

/// Complete table layout for one screenshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableLayout {
    pub columns: ColumnLayout,
    pub tables: BTreeMap<String, TableConfig>,
}

impl TableLayout {
    /// Loads the layout file. A missing or invalid file is fatal for the batch.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("OCR layout file not found: {}", path.display()))?;
        let layout = Self::from_json(&contents)
            .with_context(|| format!("Invalid OCR layout file: {}", path.display()))?;

        log::info!(
            "Layout loaded from {}: {} tables, {} rows",
            path.display(),
            layout.tables.len(),
            layout.row_count()
        );

        Ok(layout)
    }

    /// Parses a layout document.
    ///
    /// Top-level entries without a `rows` array (such as leftover OCR engine
    /// options) are not tables and are ignored.
    pub fn from_json(contents: &str) -> Result<Self> {
        let raw: RawLayout = serde_json::from_str(contents)?;
        let mut tables = BTreeMap::new();

        for (name, value) in raw.entries {
            if value.get("rows").is_none() {
                log::debug!("Ignoring non-table layout entry '{}'", name);
                continue;
            }
            let table: TableConfig = serde_json::from_value(value)
                .with_context(|| format!("Invalid rows for table '{}'", name))?;
            tables.insert(name, table);
        }

        if tables.is_empty() {
            return Err(anyhow!("Layout defines no tables"));
        }

        let layout = TableLayout {
            columns: raw.columns,
            tables,
        };
        for problem in layout.degenerate_bands() {
            log::warn!("Layout band is empty and will crop nothing: {}", problem);
        }

        Ok(layout)
    }

    /// Total number of configured rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(|t| t.rows.len()).sum()
    }

    /// Describes every band whose end does not lie after its start.
    pub fn degenerate_bands(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (name, band) in [("ratio", &self.columns.ratio), ("stock", &self.columns.stock)] {
            if band.x_end <= band.x_start {
                problems.push(format!(
                    "column '{}' x {}..{}",
                    name, band.x_start, band.x_end
                ));
            }
        }

        for (table, config) in &self.tables {
            for (i, row) in config.rows.iter().enumerate() {
                if row.y_end <= row.y_start {
                    problems.push(format!(
                        "table '{}' row {} y {}..{}",
                        table,
                        i + 1,
                        row.y_start,
                        row.y_end
                    ));
                }
            }
        }

        problems
    }
}

/// Processor settings. Every field falls back to its default when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Directory the capture process drops `<lot_id>.png` + `<lot_id>.json` into
    pub screenshots_dir: PathBuf,
    /// Archive for consumed pairs
    pub processed_dir: PathBuf,
    /// Screenshots whose sidecar is missing or unreadable
    pub quarantine_dir: PathBuf,
    /// How long a screenshot without a usable sidecar stays in the input
    /// directory before it is quarantined
    pub quarantine_after_secs: u64,
    /// Master dataset
    pub output_csv: PathBuf,
    /// Per-lot terminal status ledger
    pub status_log: PathBuf,
    /// Glyph template directory
    pub template_dir: PathBuf,
    /// Where cell crops are written when `save_debug_crops` is on
    pub debug_dir: PathBuf,
    pub save_debug_crops: bool,
    /// Minimum template match score (0.0-1.0)
    pub confidence_threshold: f32,
    /// Hits closer than this to the previous glyph are merged
    pub dedup_tolerance_px: u32,
    /// Cores left free for the rest of the machine
    pub reserved_cores: usize,
    /// Hard worker count, overrides the core-based sizing
    pub max_workers: Option<usize>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            screenshots_dir: PathBuf::from("screenshots"),
            processed_dir: PathBuf::from("screenshots/processed"),
            quarantine_dir: PathBuf::from("screenshots/quarantine"),
            quarantine_after_secs: 3600,
            output_csv: PathBuf::from("market_data.csv"),
            status_log: PathBuf::from("screenshots/processing_status.csv"),
            template_dir: PathBuf::from("templates/numbers"),
            debug_dir: PathBuf::from("cropped_debug"),
            save_debug_crops: true,
            confidence_threshold: crate::ocr::matcher::CONFIDENCE_THRESHOLD,
            dedup_tolerance_px: crate::ocr::matcher::DEDUP_TOLERANCE_PX,
            reserved_cores: 2,
            max_workers: None,
        }
    }
}

impl ProcessorSettings {
    /// Loads settings from `path`.
    ///
    /// When `required` is false a missing file means defaults. A file that
    /// exists but does not parse is always an error.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() {
            if required {
                return Err(anyhow!("Settings file not found: {}", path.display()));
            }
            log::info!("{} not found. Using default settings.", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;

        log::info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Returns a copy with every relative path resolved against `base`.
    pub fn resolved(&self, base: &Path) -> Self {
        Self {
            screenshots_dir: resolve(base, &self.screenshots_dir),
            processed_dir: resolve(base, &self.processed_dir),
            quarantine_dir: resolve(base, &self.quarantine_dir),
            output_csv: resolve(base, &self.output_csv),
            status_log: resolve(base, &self.status_log),
            template_dir: resolve(base, &self.template_dir),
            debug_dir: resolve(base, &self.debug_dir),
            ..self.clone()
        }
    }

    /// Age at which a screenshot without a usable sidecar is quarantined.
    pub fn quarantine_after(&self) -> Duration {
        Duration::from_secs(self.quarantine_after_secs)
    }

    /// Debug crop directory, if crops are enabled.
    pub fn debug_dir(&self) -> Option<&Path> {
        self.save_debug_crops.then_some(self.debug_dir.as_path())
    }

    /// Pool size: available parallelism minus the reserved cores, at least 1.
    pub fn worker_count(&self) -> usize {
        if let Some(n) = self.max_workers {
            return n.max(1);
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cores.saturating_sub(self.reserved_cores).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LAYOUT_JSON: &str = r#"{
        "tesseract_options": "--psm 7",
        "columns": {
            "ratio": {"x_start": 100, "x_end": 220},
            "stock": {"x_start": 240, "x_end": 330}
        },
        "sell": {"rows": [{"y_start": 10, "y_end": 30}, {"y_start": 40, "y_end": 60}]},
        "buy": {"rows": [{"y_start": 200, "y_end": 220}]}
    }"#;

    #[test]
    fn test_layout_from_json() {
        let layout = TableLayout::from_json(LAYOUT_JSON).unwrap();

        assert_eq!(layout.columns.ratio, ColumnBand { x_start: 100, x_end: 220 });
        assert_eq!(layout.columns.stock.x_end, 330);
        assert_eq!(layout.tables.len(), 2);
        assert_eq!(layout.tables["sell"].rows.len(), 2);
        assert_eq!(layout.tables["buy"].rows[0], RowBand { y_start: 200, y_end: 220 });
        assert_eq!(layout.row_count(), 3);
        assert!(layout.degenerate_bands().is_empty());
    }

    #[test]
    fn test_layout_requires_columns() {
        let json = r#"{"sell": {"rows": [{"y_start": 1, "y_end": 2}]}}"#;
        assert!(TableLayout::from_json(json).is_err());
    }

    #[test]
    fn test_layout_requires_a_table() {
        let json = r#"{"columns": {
            "ratio": {"x_start": 0, "x_end": 10},
            "stock": {"x_start": 10, "x_end": 20}
        }}"#;
        assert!(TableLayout::from_json(json).is_err());
    }

    #[test]
    fn test_layout_reports_degenerate_bands() {
        let json = r#"{
            "columns": {
                "ratio": {"x_start": 50, "x_end": 50},
                "stock": {"x_start": 10, "x_end": 20}
            },
            "sell": {"rows": [{"y_start": 30, "y_end": 10}]}
        }"#;
        let layout = TableLayout::from_json(json).unwrap();
        let problems = layout.degenerate_bands();

        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("ratio"));
        assert!(problems[1].contains("sell"));
    }

    #[test]
    fn test_layout_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(TableLayout::load(&dir.path().join("ocr_config.json")).is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ProcessorSettings::default();
        assert_eq!(settings.output_csv, PathBuf::from("market_data.csv"));
        assert_eq!(settings.confidence_threshold, 0.70);
        assert_eq!(settings.dedup_tolerance_px, 2);
        assert!(settings.save_debug_crops);
        assert_eq!(settings.quarantine_after(), Duration::from_secs(3600));
    }

    #[test]
    fn test_settings_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processor.json");
        std::fs::write(&path, r#"{"save_debug_crops": false, "max_workers": 3}"#).unwrap();

        let settings = ProcessorSettings::load(&path, true).unwrap();

        assert!(!settings.save_debug_crops);
        assert_eq!(settings.worker_count(), 3);
        assert_eq!(settings.screenshots_dir, PathBuf::from("screenshots"));
        assert!(settings.debug_dir().is_none());
    }

    #[test]
    fn test_settings_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processor.json");

        assert_eq!(
            ProcessorSettings::load(&path, false).unwrap(),
            ProcessorSettings::default()
        );
        assert!(ProcessorSettings::load(&path, true).is_err());
    }

    #[test]
    fn test_settings_resolved() {
        let settings = ProcessorSettings::default().resolved(Path::new("/data"));
        assert_eq!(settings.screenshots_dir, PathBuf::from("/data/screenshots"));
        assert_eq!(settings.output_csv, PathBuf::from("/data/market_data.csv"));
    }

    #[test]
    fn test_worker_count_floor() {
        let settings = ProcessorSettings {
            reserved_cores: 10_000,
            ..ProcessorSettings::default()
        };
        assert_eq!(settings.worker_count(), 1);

        let settings = ProcessorSettings {
            max_workers: Some(0),
            ..ProcessorSettings::default()
        };
        assert_eq!(settings.worker_count(), 1);
    }
}
