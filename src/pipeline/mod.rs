// Pipeline execution module
// Batch processing of catalog items and the per-run log

pub mod batch;
pub mod run_log;
pub mod source;

pub use batch::{
    process_and_store, run_pipeline, run_pipeline_with, ItemError, ItemStage, PipelineError,
    RunSummary,
};
pub use run_log::{log_file_name, RunLog, RunLogError};
pub use source::{AudioFeatureExtractor, FeatureSource};
