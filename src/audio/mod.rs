// Audio processing module
// Handles decoding, resampling and track-level feature extraction

pub mod features;
pub mod filters;
pub mod ingest;
pub mod spectrum;

pub use features::{
    analyze_file, extract_features, AnalysisConfig, FeatureVector, Onset, OnsetConfig, N_MFCC,
};
pub use ingest::{decode_file, load_mono, resample_mono, AudioData, AudioError};
pub use spectrum::Spectrogram;
