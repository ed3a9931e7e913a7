//! Batch runner - main entry point for the `process` command.
//!
//! Runs one batch through DISCOVER → DISPATCH → COLLECT → PERSIST → SORT →
//! ARCHIVE. Only this module touches the dataset, the archive directories and
//! the status ledger; workers just return reports.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::Path;

use crate::batch::archive::archive_pair;
use crate::batch::config::{ProcessorSettings, TableLayout};
use crate::batch::inbox::{discover_screenshots, WorkItem};
use crate::batch::status::{append_status, LotStatus, StatusEntry};
use crate::batch::worker::{isolate, process_screenshot, ScreenshotReport, WorkerContext};
use crate::dataset::{append_records, sort_dataset};
use crate::ocr::{GlyphRecognizer, TemplateSet};

/// Counts reported at the end of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub discovered: usize,
    pub done: usize,
    pub empty: usize,
    pub no_metadata: usize,
    pub errors: usize,
    pub records_written: usize,
}

impl BatchSummary {
    fn count(&mut self, status: LotStatus) {
        match status {
            LotStatus::Done => self.done += 1,
            LotStatus::Empty => self.empty += 1,
            LotStatus::NoMetadata => self.no_metadata += 1,
            LotStatus::Error => self.errors += 1,
        }
    }
}

/// Loads everything the workers share. Any failure here aborts the batch.
pub fn prepare_context(settings: &ProcessorSettings, layout_path: &Path) -> Result<WorkerContext> {
    let layout = TableLayout::load(layout_path)?;
    log::info!(
        "Layout: {} tables, {} rows",
        layout.tables.len(),
        layout.row_count()
    );

    let templates = TemplateSet::load(&settings.template_dir)?;
    templates.ensure_usable()?;

    Ok(WorkerContext {
        layout,
        templates,
        recognizer: GlyphRecognizer::new(
            settings.confidence_threshold,
            settings.dedup_tolerance_px,
        ),
        debug_dir: settings.debug_dir().map(Path::to_path_buf),
    })
}

fn create_output_dirs(settings: &ProcessorSettings) -> Result<()> {
    let mut dirs: Vec<&Path> = vec![
        settings.processed_dir.as_path(),
        settings.quarantine_dir.as_path(),
    ];
    if let Some(debug_dir) = settings.debug_dir() {
        dirs.push(debug_dir);
    }
    for file in [&settings.output_csv, &settings.status_log] {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            dirs.push(parent);
        }
    }
    crate::paths::ensure_directories(dirs).context("Failed to create output directories")
}

/// Runs `process` over every item on a pool of `worker_count` threads.
///
/// Every item yields exactly one report, in the same order as `items`.
fn process_all<F>(
    items: &[WorkItem],
    worker_count: usize,
    process: F,
) -> Result<Vec<ScreenshotReport>>
where
    F: Fn(&WorkItem) -> Result<ScreenshotReport> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .thread_name(|i| format!("ocr-worker-{}", i + 1))
        .build()
        .context("Failed to build worker pool")?;

    log::info!("Processing {} screenshots on {} workers", items.len(), worker_count);

    Ok(pool.install(|| {
        items
            .par_iter()
            .map(|item| isolate(item, &process))
            .collect()
    }))
}

/// Moves each consumed pair to its destination. Failures are logged only.
///
/// A screenshot without a usable sidecar stays in place until it is older
/// than `quarantine_after`, since its sidecar may still be on its way.
fn archive_reports(reports: &mut [ScreenshotReport], settings: &ProcessorSettings) {
    for report in reports.iter_mut() {
        let dest = match report.status {
            LotStatus::Done | LotStatus::Empty => &settings.processed_dir,
            LotStatus::NoMetadata if report.item.is_older_than(settings.quarantine_after()) => {
                &settings.quarantine_dir
            }
            LotStatus::NoMetadata => {
                log::info!("Leaving {} for the next run", report.item.file_name());
                report.detail.push_str("; waiting for sidecar");
                continue;
            }
            // Left in place for the next run
            LotStatus::Error => continue,
        };
        match archive_pair(&report.item.screenshot_path, &report.item.metadata_path, dest) {
            Ok(()) if report.status == LotStatus::NoMetadata => {
                report.detail.push_str("; quarantined");
            }
            Ok(()) => {}
            Err(e) => log::warn!("Could not archive {}: {:#}", report.item.file_name(), e),
        }
    }
}

fn status_entries(reports: &[ScreenshotReport]) -> Vec<StatusEntry> {
    reports
        .iter()
        .map(|r| StatusEntry {
            lot_id: r.lot_id.clone(),
            screenshot: r.item.file_name(),
            status: r.status,
            records: r.records.len(),
            detail: r.detail.clone(),
        })
        .collect()
}

/// Runs one batch.
///
/// Returns `Err` when the input directory cannot be listed or the dataset
/// append fails. After a failed append nothing is archived, so the whole
/// batch is retried on the next run.
pub fn run_batch(settings: &ProcessorSettings, ctx: WorkerContext) -> Result<BatchSummary> {
    run_batch_with(settings, |item| process_screenshot(item, &ctx))
}

fn run_batch_with<F>(settings: &ProcessorSettings, process: F) -> Result<BatchSummary>
where
    F: Fn(&WorkItem) -> Result<ScreenshotReport> + Sync,
{
    // DISCOVER
    let items = discover_screenshots(&settings.screenshots_dir)?;
    let mut summary = BatchSummary {
        discovered: items.len(),
        ..Default::default()
    };
    if items.is_empty() {
        log::info!(
            "No screenshots in {}. Nothing to do.",
            settings.screenshots_dir.display()
        );
        return Ok(summary);
    }
    log::info!("Found {} screenshots", items.len());

    create_output_dirs(settings)?;

    // DISPATCH + COLLECT
    let worker_count = settings.worker_count().min(items.len());
    let mut reports = process_all(&items, worker_count, process)?;
    for report in &reports {
        summary.count(report.status);
    }

    // PERSIST
    let records: Vec<_> = reports
        .iter()
        .flat_map(|r| r.records.iter().cloned())
        .collect();
    if records.is_empty() {
        log::info!("No records extracted in this batch");
    } else {
        append_records(&settings.output_csv, &records)?;
        summary.records_written = records.len();
        log::info!(
            "Appended {} records to {}",
            records.len(),
            settings.output_csv.display()
        );

        // SORT
        match sort_dataset(&settings.output_csv) {
            Ok(total) => log::info!("Dataset sorted ({} rows)", total),
            Err(e) => log::warn!("Dataset sort failed, left unsorted: {:#}", e),
        }
    }

    // ARCHIVE
    archive_reports(&mut reports, settings);

    if let Err(e) = append_status(&settings.status_log, &status_entries(&reports)) {
        log::warn!("Could not update status log: {:#}", e);
    }

    log::info!(
        "Batch complete: {} done, {} empty, {} without metadata, {} errors, {} records",
        summary.done,
        summary.empty,
        summary.no_metadata,
        summary.errors,
        summary.records_written
    );

    Ok(summary)
}
