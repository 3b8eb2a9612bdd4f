// Run configuration
// Paths and sizes for one pipeline run; the binary fills this from CLI arguments

use std::path::PathBuf;

use crate::audio::AnalysisConfig;
use crate::catalog::CatalogSource;

/// Default batch size between commits
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the FMA dataset (holds `fma_small/`)
    pub dataset_root: PathBuf,

    /// Path of the metadata table (`tracks.csv`)
    pub metadata_path: PathBuf,

    /// SQLite database file
    pub db_path: PathBuf,

    /// Directory receiving `processing_log_*.log`
    pub log_dir: PathBuf,

    /// Items per transaction
    pub batch_size: usize,

    pub analysis: AnalysisConfig,
}

impl PipelineConfig {
    /// Defaults rooted at `dataset_root`, with the metadata table in its usual place
    pub fn with_dataset_root(dataset_root: impl Into<PathBuf>) -> Self {
        let dataset_root = dataset_root.into();
        PipelineConfig {
            metadata_path: dataset_root.join("fma_metadata").join("tracks.csv"),
            dataset_root,
            ..PipelineConfig::default()
        }
    }

    pub fn catalog_source(&self) -> CatalogSource {
        CatalogSource {
            metadata_path: self.metadata_path.clone(),
            dataset_root: self.dataset_root.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            dataset_root: PathBuf::from("dataset"),
            metadata_path: PathBuf::from("dataset/fma_metadata/tracks.csv"),
            db_path: PathBuf::from("music_mood.db"),
            log_dir: PathBuf::from("."),
            batch_size: DEFAULT_BATCH_SIZE,
            analysis: AnalysisConfig::default(),
        }
    }
}
