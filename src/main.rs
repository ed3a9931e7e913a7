//! Market OCR
//!
//! Batch processor for captured currency-exchange screenshots. Reads the
//! ratio and stock columns of every listing table with glyph template
//! matching, appends the rows to a master CSV dataset, and archives the
//! consumed screenshots.

mod batch;
mod dataset;
mod history;
mod logging;
mod ocr;
mod paths;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::batch::{prepare_context, run_batch, ProcessorSettings};

const DEFAULT_LAYOUT: &str = "ocr_config.json";
const DEFAULT_SETTINGS: &str = "processor.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every screenshot waiting in the input directory
    Process(ProcessArgs),
    /// Compile downloaded pair-history JSON files into one CSV
    History(HistoryArgs),
}

#[derive(clap::Args, Debug)]
struct ProcessArgs {
    /// Table layout file
    #[arg(long, default_value = DEFAULT_LAYOUT)]
    layout: PathBuf,
    /// Processor settings file (defaults are used if processor.json is absent)
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Directory holding <lot_id>.png + <lot_id>.json pairs
    #[arg(long)]
    screenshots_dir: Option<PathBuf>,
    /// Master dataset CSV
    #[arg(long)]
    output: Option<PathBuf>,
    /// Glyph template directory
    #[arg(long)]
    templates: Option<PathBuf>,
    /// Fixed number of worker threads
    #[arg(long)]
    workers: Option<usize>,
    /// Do not write per-cell debug crops
    #[arg(long, default_value_t = false)]
    no_debug_crops: bool,
}

#[derive(clap::Args, Debug)]
struct HistoryArgs {
    /// Directory of pair-history JSON files
    #[arg(long, default_value = "currencyPairHistory")]
    input_dir: PathBuf,
    /// Output CSV
    #[arg(long, default_value = "scout_macro_data.csv")]
    output: PathBuf,
    /// CSV with itemID and name columns
    #[arg(long, default_value = "target_item_ids.csv")]
    lookup: PathBuf,
}

impl ProcessArgs {
    /// Loads the settings file and applies the command-line overrides.
    fn settings(&self) -> Result<ProcessorSettings> {
        let mut settings = match &self.settings {
            Some(path) => ProcessorSettings::load(path, true)?,
            None => ProcessorSettings::load(
                &paths::resolve(paths::get_base_dir(), Path::new(DEFAULT_SETTINGS)),
                false,
            )?,
        };

        if let Some(dir) = &self.screenshots_dir {
            settings.screenshots_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            settings.output_csv = output.clone();
        }
        if let Some(templates) = &self.templates {
            settings.template_dir = templates.clone();
        }
        if let Some(workers) = self.workers {
            settings.max_workers = Some(workers);
        }
        if self.no_debug_crops {
            settings.save_debug_crops = false;
        }

        Ok(settings.resolved(paths::get_base_dir()))
    }
}

fn run_process(args: &ProcessArgs) -> Result<()> {
    let settings = args.settings()?;
    let layout_path = paths::resolve(paths::get_base_dir(), &args.layout);

    let ctx = prepare_context(&settings, &layout_path)?;
    run_batch(&settings, ctx)?;
    Ok(())
}

fn run_history(args: &HistoryArgs) -> Result<()> {
    let base = paths::get_base_dir();
    let names = history::load_item_names(&paths::resolve(base, &args.lookup))?;
    log::info!("Loaded {} item names", names.len());

    history::compile_history(
        &paths::resolve(base, &args.input_dir),
        &paths::resolve(base, &args.output),
        &names,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&paths::get_logs_dir());
    logging::install_panic_hook();

    let result = match &cli.command {
        Command::Process(args) => run_process(args),
        Command::History(args) => run_history(args),
    };

    if let Err(e) = &result {
        log::error!("{:#}", e);
    }
    result
}
