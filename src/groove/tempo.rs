// Tempo Estimation - BPM detection using inter-onset intervals
// Uses an IOI histogram to find the dominant beat period

use serde::{Deserialize, Serialize};
use crate::audio::features::Onset;

/// Tempo estimation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Estimated beats per minute, 0.0 when no periodic structure was found
    pub bpm: f64,

    /// Confidence in the estimate [0.0, 1.0]
    /// Higher values indicate stronger periodic structure
    pub confidence: f32,

    /// Number of onsets the estimate was built from
    pub onset_count: usize,
}

impl TempoEstimate {
    fn none(onset_count: usize) -> Self {
        TempoEstimate {
            bpm: 0.0,
            confidence: 0.0,
            onset_count,
        }
    }
}

/// Configuration for tempo estimation
#[derive(Debug, Clone)]
pub struct TempoConfig {
    /// Minimum BPM to consider
    pub min_bpm: f64,

    /// Maximum BPM to consider
    pub max_bpm: f64,

    /// Number of bins for IOI histogram
    pub histogram_bins: usize,

    /// Minimum number of onsets required for estimation
    pub min_onsets: usize,

    /// Center of the log-normal tempo prior used to pick between metrical levels
    pub prior_bpm: f64,

    /// Width of the tempo prior in octaves
    pub prior_octaves: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 60.0,
            max_bpm: 240.0,
            histogram_bins: 300,
            min_onsets: 8,
            prior_bpm: 120.0,
            prior_octaves: 1.0,
        }
    }
}

/// Estimate tempo from onset detections
///
/// Algorithm:
/// 1. Compute inter-onset intervals (IOIs) between every pair of onsets
///    up to the longest beat period
/// 2. Build IOI histogram, also voting for half and double intervals
/// 3. Smooth and find local maxima
/// 4. Weight peaks by a tempo prior and convert the best one to BPM
///
/// Returns a BPM of 0.0 when there are too few onsets or no histogram peak.
pub fn estimate_tempo_with_config(onsets: &[Onset], config: &TempoConfig) -> TempoEstimate {
    // Check if we have enough onsets
    if onsets.len() < config.min_onsets {
        return TempoEstimate::none(onsets.len());
    }

    // Step 1: Compute inter-onset intervals (IOIs)
    let max_interval_ms = if config.min_bpm > 0.0 { 60000.0 / config.min_bpm } else { 0.0 };
    let iois = compute_iois(onsets, max_interval_ms);

    if iois.is_empty() {
        return TempoEstimate::none(onsets.len());
    }

    // Step 2: Build IOI histogram
    let histogram = build_ioi_histogram(&iois, config);

    // Step 3: Find peaks in histogram
    let peaks = find_histogram_peaks(&histogram, config);

    // Step 4: Select best peak in valid BPM range
    let Some((best_interval_ms, confidence)) = select_best_tempo(&peaks, &histogram, config) else {
        return TempoEstimate::none(onsets.len());
    };

    TempoEstimate {
        bpm: 60000.0 / best_interval_ms, // Convert ms per beat to BPM
        confidence,
        onset_count: onsets.len(),
    }
}

/// Compute inter-onset intervals between every onset and each later onset
/// no more than `max_interval_ms` away
/// Onsets must be in time order
fn compute_iois(onsets: &[Onset], max_interval_ms: f64) -> Vec<f64> {
    let mut iois = Vec::new();

    for (i, onset) in onsets.iter().enumerate() {
        for later in &onsets[i + 1..] {
            let interval = later.timestamp_ms - onset.timestamp_ms;
            if interval > max_interval_ms {
                break;
            }
            if interval > 0.0 {
                iois.push(interval);
            }
        }
    }

    iois
}

/// Log-normal weight over tempo, 1.0 at `prior_bpm`
fn tempo_prior(bpm: f64, config: &TempoConfig) -> f32 {
    if bpm <= 0.0 || config.prior_bpm <= 0.0 || config.prior_octaves <= 0.0 {
        return 1.0;
    }
    let octaves = (bpm / config.prior_bpm).log2() / config.prior_octaves;
    (-0.5 * octaves * octaves).exp() as f32
}

/// BPM at the center of histogram bin `bin`
fn bin_bpm(bin: usize, min_interval_ms: f64, bin_width: f64) -> f64 {
    60000.0 / (min_interval_ms + (bin as f64 + 0.5) * bin_width)
}

/// Interval range in milliseconds covered by the histogram, and its bin width
fn interval_range(config: &TempoConfig) -> Option<(f64, f64)> {
    // Guard against zero BPM values
    if config.max_bpm <= 0.0 || config.min_bpm <= 0.0 || config.histogram_bins == 0 {
        return None;
    }

    let min_interval_ms = 60000.0 / config.max_bpm; // Max BPM = min interval
    let max_interval_ms = 60000.0 / config.min_bpm; // Min BPM = max interval

    if max_interval_ms - min_interval_ms < f64::EPSILON {
        return None;
    }

    let bin_width = (max_interval_ms - min_interval_ms) / config.histogram_bins as f64;
    Some((min_interval_ms, bin_width))
}

/// Build histogram of inter-onset intervals
/// Bins are distributed linearly across the interval range
fn build_ioi_histogram(iois: &[f64], config: &TempoConfig) -> Vec<f32> {
    let mut histogram = vec![0.0f32; config.histogram_bins];
    let Some((min_interval_ms, bin_width)) = interval_range(config) else {
        return histogram;
    };
    let max_interval_ms = min_interval_ms + bin_width * config.histogram_bins as f64;

    let mut vote = |interval: f64, weight: f32| {
        if interval >= min_interval_ms && interval <= max_interval_ms {
            let bin = ((interval - min_interval_ms) / bin_width) as usize;
            histogram[bin.min(config.histogram_bins - 1)] += weight;
        }
    };

    for &ioi in iois {
        vote(ioi, 1.0);

        // Also consider half and double tempo (for 2:1 and 1:2 relationships)
        // Lower weight for derived intervals
        vote(ioi / 2.0, 0.5);
        vote(ioi * 2.0, 0.5);
    }

    smooth_histogram(&histogram)
}

/// Smooth histogram with a (1, 2, 1) / 4 triangular kernel
/// Missing neighbours at the edges are dropped and the remaining weights renormalised
fn smooth_histogram(histogram: &[f32]) -> Vec<f32> {
    (0..histogram.len())
        .map(|i| {
            let mut sum = 2.0 * histogram[i];
            let mut weight = 2.0;
            if i > 0 {
                sum += histogram[i - 1];
                weight += 1.0;
            }
            if i + 1 < histogram.len() {
                sum += histogram[i + 1];
                weight += 1.0;
            }
            sum / weight
        })
        .collect()
}

/// Find peaks in the histogram using local maxima detection
/// The first bin of a flat top counts as the peak
/// Each peak is scored by its height times the tempo prior
fn find_histogram_peaks(histogram: &[f32], config: &TempoConfig) -> Vec<(usize, f32)> {
    if histogram.len() < 3 {
        return Vec::new();
    }
    let Some((min_interval_ms, bin_width)) = interval_range(config) else {
        return Vec::new();
    };

    let mut peaks: Vec<(usize, f32)> = (1..histogram.len() - 1)
        .filter(|&i| histogram[i] > histogram[i - 1] && histogram[i] >= histogram[i + 1])
        .map(|i| {
            let prior = tempo_prior(bin_bpm(i, min_interval_ms, bin_width), config);
            (i, histogram[i] * prior)
        })
        .collect();

    // Sort peaks by score (descending); stable, so ties keep the shorter interval
    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    // Keep top peaks
    peaks.truncate(5);

    peaks
}

/// Select the strongest peak, returning its beat interval in ms and a confidence
fn select_best_tempo(
    peaks: &[(usize, f32)],
    histogram: &[f32],
    config: &TempoConfig,
) -> Option<(f64, f32)> {
    let &(best_bin, _) = peaks.first()?;
    let (min_interval_ms, bin_width) = interval_range(config)?;
    let peak_strength = *histogram.get(best_bin)?;

    // Bin center
    let interval_ms = min_interval_ms + (best_bin as f64 + 0.5) * bin_width;

    // Calculate confidence based on peak strength relative to histogram mean
    let histogram_mean: f32 = histogram.iter().sum::<f32>() / histogram.len().max(1) as f32;
    let confidence = if histogram_mean > 0.0 && peak_strength.is_finite() {
        let raw = peak_strength / (histogram_mean * 3.0);
        if raw.is_finite() { raw.min(1.0) } else { 0.0 }
    } else {
        0.0
    };

    Some((interval_ms, confidence))
}
