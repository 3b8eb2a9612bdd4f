// Track-level feature extraction and onset detection
// Computes the fixed-shape feature vector used for mood scoring:
// tempo, spectral shape, energy, chroma and MFCC means over the whole track

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::Path;

use crate::audio::filters::{
    apply_filterbank, chroma_filterbank, dct_basis, mel_filterbank, power_to_db, N_CHROMA,
};
use crate::audio::ingest::load_mono;
use crate::audio::spectrum::{frames, pad_centered, PadMode, Spectrogram};
use crate::audio::AudioError;
use crate::groove::tempo::{estimate_tempo_with_config, TempoConfig};

/// Number of mel-frequency cepstral coefficients kept
pub const N_MFCC: usize = 13;

/// Fixed-shape feature vector for one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Estimated tempo in BPM (0.0 when no beat structure is found)
    pub tempo: f64,

    /// Mean spectral centroid (Hz)
    pub spectral_centroid: f64,

    /// Mean spectral bandwidth (Hz, second-order deviation around the centroid)
    pub spectral_bandwidth: f64,

    /// Mean frame RMS amplitude
    pub rms_energy: f64,

    /// Mean fraction of sign changes per frame
    pub zero_crossing_rate: f64,

    /// Mean of the max-normalised chromagram over frames and pitch classes
    pub chroma_mean: f64,

    /// Per-coefficient MFCC means, `mfcc_0` .. `mfcc_12`
    pub mfcc: [f64; N_MFCC],
}

impl FeatureVector {
    /// Feature names and values in a stable order
    pub fn named_values(&self) -> Vec<(String, f64)> {
        let mut values = vec![
            ("tempo".to_string(), self.tempo),
            ("spectral_centroid".to_string(), self.spectral_centroid),
            ("spectral_bandwidth".to_string(), self.spectral_bandwidth),
            ("rms_energy".to_string(), self.rms_energy),
            ("zero_crossing_rate".to_string(), self.zero_crossing_rate),
            ("chroma_mean".to_string(), self.chroma_mean),
        ];
        values.extend(
            self.mfcc
                .iter()
                .enumerate()
                .map(|(i, &v)| (format!("mfcc_{}", i), v)),
        );
        values
    }

    /// Name of the first feature that is NaN or infinite
    pub fn first_non_finite(&self) -> Option<String> {
        self.named_values()
            .into_iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(name, _)| name)
    }
}

/// Serialized as a flat map in `named_values` order
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values = self.named_values();
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (name, value) in &values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Onset detection result
#[derive(Debug, Clone)]
pub struct Onset {
    /// Timestamp in milliseconds from start of audio
    pub timestamp_ms: f64,
}

/// Configuration for onset peak picking
#[derive(Debug, Clone)]
pub struct OnsetConfig {
    /// Threshold multiplier for adaptive peak picking
    /// Threshold = mean(flux) + threshold_factor * std(flux)
    pub threshold_factor: f32,

    /// Minimum time between onsets in milliseconds
    /// Prevents duplicate detections
    pub min_onset_gap_ms: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            threshold_factor: 1.5,
            min_onset_gap_ms: 30.0,
        }
    }
}

/// Analysis parameters shared by every feature
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Rate every track is resampled to before analysis
    pub sample_rate: u32,

    /// FFT size and frame length in samples
    pub n_fft: usize,

    /// Hop between frames in samples
    pub hop_length: usize,

    /// Mel bands feeding the MFCCs
    pub n_mels: usize,

    /// Dynamic range kept in the mel dB spectrogram
    pub top_db: f32,

    pub onset: OnsetConfig,
    pub tempo: TempoConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            top_db: 80.0,
            onset: OnsetConfig::default(),
            tempo: TempoConfig::default(),
        }
    }
}

/// Decode an audio file and extract its feature vector
pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<FeatureVector, AudioError> {
    let (samples, sample_rate) = load_mono(path, config.sample_rate)?;
    extract_features(&samples, sample_rate, config)
}

/// Extract the track-level feature vector from mono samples.
/// All-or-nothing: any failure or non-finite result is an error.
pub fn extract_features(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<FeatureVector, AudioError> {
    if samples.is_empty() {
        return Err(AudioError::InvalidData("no samples to analyze".to_string()));
    }
    if sample_rate == 0 {
        return Err(AudioError::InvalidData("sample rate is zero".to_string()));
    }

    let spectrogram = Spectrogram::compute(samples, sample_rate, config.n_fft, config.hop_length)?;

    // Tempo from spectral-flux onsets
    let flux = compute_spectral_flux(&spectrogram);
    let onsets = pick_onset_peaks(&flux, sample_rate, config.hop_length, &config.onset);
    let tempo = estimate_tempo_with_config(&onsets, &config.tempo);
    log::debug!(
        "Tempo {:.1} BPM from {} onsets (confidence {:.2})",
        tempo.bpm,
        onsets.len(),
        tempo.confidence
    );

    // Spectral shape
    let mut centroid_sum = 0.0f64;
    let mut bandwidth_sum = 0.0f64;
    for column in &spectrogram.frames {
        let centroid = calculate_spectral_centroid(column, sample_rate, config.n_fft);
        centroid_sum += centroid as f64;
        bandwidth_sum +=
            calculate_spectral_bandwidth(column, sample_rate, config.n_fft, centroid) as f64;
    }
    let num_frames = spectrogram.num_frames().max(1) as f64;

    let features = FeatureVector {
        tempo: tempo.bpm,
        spectral_centroid: centroid_sum / num_frames,
        spectral_bandwidth: bandwidth_sum / num_frames,
        rms_energy: mean_frame_rms(samples, config.n_fft, config.hop_length),
        zero_crossing_rate: mean_frame_zcr(samples, config.n_fft, config.hop_length),
        chroma_mean: chroma_mean(&spectrogram),
        mfcc: mfcc_means(&spectrogram, config.n_mels, config.top_db),
    };

    if let Some(name) = features.first_non_finite() {
        return Err(AudioError::NonFiniteFeature(name));
    }

    Ok(features)
}

/// Calculate Zero-Crossing Rate (ZCR) of one frame
/// Zero counts as positive; the rate is crossings per sample
fn calculate_zcr(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[1] >= 0.0) != (pair[0] >= 0.0))
        .count();

    crossings as f32 / samples.len() as f32
}

/// Calculate RMS amplitude of one frame
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / samples.len() as f64).sqrt() as f32
}

/// Mean RMS over centered, zero-padded frames
fn mean_frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> f64 {
    let padded = pad_centered(samples, frame_length, PadMode::Zero);
    mean(frames(&padded, frame_length, hop_length).map(|f| calculate_rms(f) as f64))
}

/// Mean ZCR over centered, edge-padded frames
fn mean_frame_zcr(samples: &[f32], frame_length: usize, hop_length: usize) -> f64 {
    let padded = pad_centered(samples, frame_length, PadMode::Edge);
    mean(frames(&padded, frame_length, hop_length).map(|f| calculate_zcr(f) as f64))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Calculate spectral centroid (center of mass of spectrum)
/// Returns frequency in Hz
fn calculate_spectral_centroid(spectrum: &[f32], sample_rate: u32, window_size: usize) -> f32 {
    // Guard against zero window size
    if window_size == 0 {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    let mut total_magnitude = 0.0;

    let bin_width = sample_rate as f32 / window_size as f32;

    for (i, &magnitude) in spectrum.iter().enumerate() {
        let frequency = i as f32 * bin_width;
        weighted_sum += frequency * magnitude;
        total_magnitude += magnitude;
    }

    if total_magnitude > 0.0 {
        weighted_sum / total_magnitude
    } else {
        0.0
    }
}

/// Calculate spectral bandwidth: magnitude-weighted standard deviation of
/// frequency around the centroid
fn calculate_spectral_bandwidth(
    spectrum: &[f32],
    sample_rate: u32,
    window_size: usize,
    centroid: f32,
) -> f32 {
    if window_size == 0 {
        return 0.0;
    }

    let total_magnitude: f32 = spectrum.iter().sum();
    if total_magnitude <= 0.0 {
        return 0.0;
    }

    let bin_width = sample_rate as f32 / window_size as f32;
    let spread: f32 = spectrum
        .iter()
        .enumerate()
        .map(|(i, &magnitude)| {
            let deviation = i as f32 * bin_width - centroid;
            (magnitude / total_magnitude) * deviation * deviation
        })
        .sum();

    spread.sqrt()
}

/// Mean of the chromagram: power spectrum folded onto 12 pitch classes,
/// each frame scaled so its strongest class is 1.0
fn chroma_mean(spectrogram: &Spectrogram) -> f64 {
    let filterbank = chroma_filterbank(spectrogram.sample_rate, spectrogram.n_fft);
    let mut total = 0.0f64;
    let mut count = 0usize;

    for column in &spectrogram.frames {
        let power: Vec<f32> = column.iter().map(|m| m * m).collect();
        let chroma = apply_filterbank(&filterbank, &power);

        let peak = chroma.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        // Near-silent frames are left unscaled
        let scale = if peak > f32::MIN_POSITIVE { peak } else { 1.0 };

        total += chroma.iter().map(|&v| (v / scale) as f64).sum::<f64>();
        count += N_CHROMA;
    }

    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Per-coefficient means of the MFCCs
///
/// Power spectrum -> mel bands -> dB (clipped to `top_db` below the global
/// peak) -> orthonormal DCT-II, keeping the first `N_MFCC` coefficients.
fn mfcc_means(spectrogram: &Spectrogram, n_mels: usize, top_db: f32) -> [f64; N_MFCC] {
    const AMIN: f32 = 1e-10;

    let mel_fb = mel_filterbank(spectrogram.sample_rate, spectrogram.n_fft, n_mels);
    let dct = dct_basis(N_MFCC, n_mels);

    let mel_db: Vec<Vec<f32>> = spectrogram
        .frames
        .iter()
        .map(|column| {
            let power: Vec<f32> = column.iter().map(|m| m * m).collect();
            apply_filterbank(&mel_fb, &power)
                .into_iter()
                .map(|p| power_to_db(p, AMIN))
                .collect()
        })
        .collect();

    let peak_db = mel_db
        .iter()
        .flatten()
        .fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let floor_db = peak_db - top_db;

    let mut sums = [0.0f64; N_MFCC];
    for frame in &mel_db {
        let clipped: Vec<f32> = frame.iter().map(|&v| v.max(floor_db)).collect();
        for (sum, coeff) in sums.iter_mut().zip(apply_filterbank(&dct, &clipped)) {
            *sum += coeff as f64;
        }
    }

    let frame_count = mel_db.len().max(1) as f64;
    sums.map(|s| s / frame_count)
}

/// Compute spectral flux for all frames
/// Spectral flux = sum of positive differences between consecutive magnitude spectra
fn compute_spectral_flux(spectrogram: &Spectrogram) -> Vec<f32> {
    let mut flux = Vec::with_capacity(spectrogram.num_frames());
    let mut prev_spectrum: Option<&Vec<f32>> = None;

    for spectrum in &spectrogram.frames {
        let frame_flux = if let Some(prev) = prev_spectrum {
            spectrum
                .iter()
                .zip(prev.iter())
                .map(|(curr, prev)| (curr - prev).max(0.0))
                .sum()
        } else {
            0.0 // First frame has no flux
        };

        flux.push(frame_flux);
        prev_spectrum = Some(spectrum);
    }

    flux
}

/// Pick onset peaks from spectral flux using adaptive threshold
fn pick_onset_peaks(
    flux: &[f32],
    sample_rate: u32,
    hop_size: usize,
    config: &OnsetConfig,
) -> Vec<Onset> {
    // Guard against degenerate input
    if flux.len() < 3 || hop_size == 0 || sample_rate == 0 {
        return Vec::new();
    }

    let mean = flux.iter().sum::<f32>() / flux.len() as f32;
    let variance = flux.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / flux.len() as f32;
    let std_dev = variance.sqrt();
    let threshold = mean + config.threshold_factor * std_dev;

    let min_gap_samples = (config.min_onset_gap_ms * sample_rate as f64 / 1000.0) as usize;
    let min_gap_frames = min_gap_samples / hop_size;

    let mut onsets = Vec::new();
    let mut last_onset_frame: Option<usize> = None;

    // Find local maxima above threshold
    for i in 1..flux.len() - 1 {
        let is_peak = flux[i] > flux[i - 1] && flux[i] >= flux[i + 1];
        let above_threshold = flux[i] > threshold;
        let gap_ok = last_onset_frame.map_or(true, |last| i - last >= min_gap_frames);

        if is_peak && above_threshold && gap_ok {
            let timestamp_ms = (i * hop_size) as f64 * 1000.0 / sample_rate as f64;
            onsets.push(Onset { timestamp_ms });

            last_onset_frame = Some(i);
        }
    }

    onsets
}
