//! Per-screenshot worker.
//!
//! Reads every configured table cell of one screenshot and returns a report
//! for the orchestrator. Workers share only read-only state and never touch
//! the dataset or move files; the only thing they write is their own
//! uniquely named debug crops.

use anyhow::{Context, Result};
use image::RgbImage;
use serde::Deserialize;
use std::any::Any;
use std::io::{self, ErrorKind};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::batch::config::TableLayout;
use crate::batch::inbox::WorkItem;
use crate::batch::status::LotStatus;
use crate::dataset::ExtractedRecord;
use crate::ocr::{crop_cell, read_row, GlyphRecognizer, TemplateSet};

/// Sidecar metadata written by the capture process next to each screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LotMetadata {
    pub scan_id: i64,
    #[serde(default)]
    pub lot_id: Option<String>,
    pub timestamp_utc: String,
    pub currency_want: String,
    pub currency_have: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Read-only state shared by all workers of one batch.
#[derive(Debug)]
pub struct WorkerContext {
    pub layout: TableLayout,
    pub templates: TemplateSet,
    pub recognizer: GlyphRecognizer,
    /// Directory for cell crops, if enabled
    pub debug_dir: Option<PathBuf>,
}

/// Result of processing one screenshot.
#[derive(Debug, Clone)]
pub struct ScreenshotReport {
    pub item: WorkItem,
    pub lot_id: String,
    pub records: Vec<ExtractedRecord>,
    pub status: LotStatus,
    /// Why the screenshot ended in its status, empty when done
    pub detail: String,
}

impl ScreenshotReport {
    fn without_records(item: WorkItem, status: LotStatus, detail: String) -> Self {
        let lot_id = item.stem();
        Self {
            item,
            lot_id,
            records: Vec::new(),
            status,
            detail,
        }
    }

    /// Report for a screenshot that could not be processed at all.
    pub fn failed(item: WorkItem, detail: String) -> Self {
        Self::without_records(item, LotStatus::Error, detail)
    }
}

fn load_metadata(path: &Path) -> Result<LotMetadata> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("metadata sidecar unreadable: {}", path.display()))?;
    serde_json::from_str(&contents).context("metadata sidecar invalid")
}

/// Ledger text for a sidecar that could not be loaded.
fn metadata_problem(err: &anyhow::Error) -> String {
    let missing = err
        .downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound);
    if missing {
        "metadata sidecar not found".to_string()
    } else {
        format!("{:#}", err)
    }
}

/// Builds the crop file name: `<lot_id>_<table>_row<N>_<field>.png`.
pub fn debug_crop_name(lot_id: &str, table: &str, row_num: u32, field: &str) -> String {
    let clean = |s: &str| s.replace(['/', '\\'], "_");
    format!("{}_{}_row{}_{}.png", clean(lot_id), clean(table), row_num, field)
}

fn save_debug_crop(dir: &Path, name: &str, crop: &RgbImage) {
    if crop.width() == 0 || crop.height() == 0 {
        return;
    }
    if let Err(e) = crop.save(dir.join(name)) {
        log::warn!("Could not save debug crop {}: {}", name, e);
    }
}

/// Processes one screenshot into zero or more records.
///
/// A missing sidecar is a normal outcome (`NoMetadata`), not an error. An
/// unreadable image is returned as `Err`.
pub fn process_screenshot(item: &WorkItem, ctx: &WorkerContext) -> Result<ScreenshotReport> {
    let metadata = match load_metadata(&item.metadata_path) {
        Ok(metadata) => metadata,
        Err(e) => {
            let reason = metadata_problem(&e);
            log::warn!("Skipping {}: {}", item.file_name(), reason);
            return Ok(ScreenshotReport::without_records(
                item.clone(),
                LotStatus::NoMetadata,
                reason,
            ));
        }
    };
    let lot_id = metadata.lot_id.clone().unwrap_or_else(|| item.stem());
    if let Some(status) = metadata.status.as_deref().filter(|s| *s != "unprocessed") {
        log::debug!("{}: sidecar status is '{}'", item.file_name(), status);
    }

    log::info!("Processing: {}", item.file_name());

    let image = image::open(&item.screenshot_path)
        .with_context(|| format!("Failed to load {}", item.screenshot_path.display()))?
        .to_rgb8();

    let columns = &ctx.layout.columns;
    let mut records = Vec::new();

    for (table_name, table) in &ctx.layout.tables {
        for (i, row) in table.rows.iter().enumerate() {
            let row_num = i as u32 + 1;
            let ratio_cell = crop_cell(&image, &columns.ratio, row);
            let stock_cell = crop_cell(&image, &columns.stock, row);

            if let Some(dir) = &ctx.debug_dir {
                let ratio_name = debug_crop_name(&lot_id, table_name, row_num, "ratio");
                let stock_name = debug_crop_name(&lot_id, table_name, row_num, "stock");
                save_debug_crop(dir, &ratio_name, &ratio_cell);
                save_debug_crop(dir, &stock_name, &stock_cell);
            }

            let values = read_row(&ctx.recognizer, &ctx.templates, &ratio_cell, &stock_cell);
            if !values.has_data() {
                continue;
            }

            records.push(ExtractedRecord {
                scan_id: metadata.scan_id,
                lot_id: lot_id.clone(),
                timestamp_utc: metadata.timestamp_utc.clone(),
                currency_want: metadata.currency_want.clone(),
                currency_have: metadata.currency_have.clone(),
                trade_type: table_name.clone(),
                row_num,
                ratio: values.ratio,
                stock: values.stock,
            });
        }
    }

    let (status, detail) = if records.is_empty() {
        (LotStatus::Empty, "no row produced a ratio or stock".to_string())
    } else {
        (LotStatus::Done, String::new())
    };

    log::info!(
        "{}: {} rows extracted ({})",
        item.file_name(),
        records.len(),
        status
    );

    Ok(ScreenshotReport {
        item: item.clone(),
        lot_id,
        records,
        status,
        detail,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `process` on one item, converting both errors and panics into an
/// `Error` report.
pub fn isolate<F>(item: &WorkItem, process: F) -> ScreenshotReport
where
    F: FnOnce(&WorkItem) -> Result<ScreenshotReport>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| process(item))) {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            log::error!("Failed to process {}: {:#}", item.file_name(), e);
            ScreenshotReport::failed(item.clone(), format!("{:#}", e))
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            log::error!("Worker fault while processing {}: {}", item.file_name(), msg);
            ScreenshotReport::failed(item.clone(), format!("worker fault: {}", msg))
        }
    }
}
