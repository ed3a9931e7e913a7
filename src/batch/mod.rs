//! Batch processing of captured market screenshots.
//!
//! This module handles:
//! - Table layout and processor settings (`config`)
//! - Discovering screenshot/sidecar pairs in the input directory (`inbox`)
//! - Reading one screenshot into records (`worker`)
//! - Running a whole batch (`runner`)
//! - Moving consumed inputs aside (`archive`) and recording each outcome (`status`)

pub mod archive;
pub mod config;
pub mod inbox;
pub mod runner;
pub mod status;
pub mod worker;

pub use config::ProcessorSettings;
pub use runner::{prepare_context, run_batch};
