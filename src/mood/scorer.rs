// Heuristic (formula-based) mood scorer
// Deterministic mapping from tempo, energy and brightness to mood intensities

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::FeatureVector;

/// Tempo at which the tempo factor saturates
pub const TEMPO_CEILING_BPM: f64 = 180.0;

/// Scale applied to mean RMS energy
pub const ENERGY_SCALE: f64 = 10.0;

/// Spectral centroid (Hz) that maps to a brightness of 1.0
pub const BRIGHTNESS_REFERENCE_HZ: f64 = 4000.0;

#[derive(Debug, Error)]
pub enum MoodError {
    #[error("Feature `{0}` is not a finite number")]
    InvalidFeature(&'static str),
}

/// Mood intensities for one track
///
/// Upper bound is 1.0 for `happy`, `energetic` and `angry`. There is no lower
/// clamp, so those can go negative and `sad`/`calm` can exceed 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodVector {
    pub happy: f64,
    pub sad: f64,
    pub energetic: f64,
    pub calm: f64,
    pub angry: f64,
}

/// Score a feature vector. Pure: no state is kept between calls.
pub fn score_mood(features: &FeatureVector) -> Result<MoodVector, MoodError> {
    let tempo = finite("tempo", features.tempo)?;
    let rms_energy = finite("rms_energy", features.rms_energy)?;
    let spectral_centroid = finite("spectral_centroid", features.spectral_centroid)?;
    let zero_crossing_rate = finite("zero_crossing_rate", features.zero_crossing_rate)?;

    let tempo_factor = (tempo / TEMPO_CEILING_BPM).min(1.0);
    let energy_factor = rms_energy * ENERGY_SCALE;
    let brightness = spectral_centroid / BRIGHTNESS_REFERENCE_HZ;

    let energetic = clamp_upper((tempo_factor + energy_factor) / 2.0);
    let happy = clamp_upper((brightness + tempo_factor) / 2.0);
    let angry = clamp_upper(energy_factor * zero_crossing_rate);

    Ok(MoodVector {
        happy,
        sad: 1.0 - happy,
        energetic,
        calm: 1.0 - energetic,
        angry,
    })
}

fn finite(name: &'static str, value: f64) -> Result<f64, MoodError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MoodError::InvalidFeature(name))
    }
}

// Only the upper bound is enforced
fn clamp_upper(x: f64) -> f64 {
    x.min(1.0)
}
