// Moodscan - Audio feature extraction and heuristic mood scoring
// Module declarations

pub mod audio;
pub mod catalog;
pub mod config;
pub mod groove;
pub mod mood;
pub mod pipeline;
pub mod state;

pub use config::PipelineConfig;
pub use pipeline::{run_pipeline, RunSummary};
