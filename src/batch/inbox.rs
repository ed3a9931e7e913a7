//! The screenshots directory the capture process drops lots into.
//!
//! Each lot is a `<lot_id>.png` screenshot plus a `<lot_id>.json` sidecar.
//! The capture process writes the screenshot first, so a lot may briefly be
//! seen without its sidecar.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One screenshot and its sidecar, as discovered in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Path to the `<lot_id>.png` screenshot
    pub screenshot_path: PathBuf,
    /// Path to the `<lot_id>.json` sidecar (may not exist)
    pub metadata_path: PathBuf,
}

impl WorkItem {
    /// Creates a work item, deriving the sidecar path from the screenshot.
    pub fn new(screenshot_path: PathBuf) -> Self {
        let metadata_path = screenshot_path.with_extension("json");
        Self {
            screenshot_path,
            metadata_path,
        }
    }

    /// Screenshot file name, for log lines and the status ledger.
    pub fn file_name(&self) -> String {
        self.screenshot_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Screenshot file stem, used as the lot id when the sidecar is unusable.
    pub fn stem(&self) -> String {
        self.screenshot_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// True once the screenshot has gone unmodified for at least `min_age`.
    ///
    /// A screenshot whose age cannot be determined counts as fresh.
    pub fn is_older_than(&self, min_age: Duration) -> bool {
        if min_age.is_zero() {
            return true;
        }
        fs::metadata(&self.screenshot_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= min_age)
    }
}

/// Lists `.png` files directly inside `dir`, sorted by path.
///
/// A missing directory means there is nothing to do.
pub fn discover_screenshots(dir: &Path) -> Result<Vec<WorkItem>> {
    if !dir.exists() {
        log::warn!("Screenshots directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read screenshots directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    Ok(paths.into_iter().map(WorkItem::new).collect())
}
