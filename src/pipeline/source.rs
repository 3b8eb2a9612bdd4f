// Feature sources
// Seam between the batch processor and audio analysis

use crate::audio::{analyze_file, AnalysisConfig, AudioError, FeatureVector};
use crate::catalog::ItemDescriptor;

/// Produces a feature vector for one catalog item
pub trait FeatureSource {
    fn extract(&mut self, item: &ItemDescriptor) -> Result<FeatureVector, AudioError>;
}

/// Decodes the item's audio file and runs the full analysis
#[derive(Debug, Clone, Default)]
pub struct AudioFeatureExtractor {
    config: AnalysisConfig,
}

impl AudioFeatureExtractor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }
}

impl FeatureSource for AudioFeatureExtractor {
    fn extract(&mut self, item: &ItemDescriptor) -> Result<FeatureVector, AudioError> {
        log::debug!("Extracting features for track {} from {}", item.id, item.source_path.display());
        analyze_file(&item.source_path, &self.config)
    }
}
