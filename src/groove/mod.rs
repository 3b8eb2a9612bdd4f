// Groove Engine - Tempo
// Beat period estimation from detected onsets

pub mod tempo;

pub use tempo::{estimate_tempo_with_config, TempoConfig, TempoEstimate};
