// Spectral filterbanks and transforms
// Slaney mel filterbank, 12-bin chroma filterbank, dB scaling and orthonormal DCT-II

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

/// Reference pitch of chroma bin 0 before rotation (A0, 27.5 Hz)
const A0_HZ: f64 = 440.0 / 16.0;

/// Number of pitch classes
pub const N_CHROMA: usize = 12;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz to mel on the Slaney scale: linear below 1 kHz, logarithmic above
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Inverse of `hz_to_mel`
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank, `n_mels` rows by `n_fft / 2 + 1` columns.
///
/// Bands are spaced evenly on the Slaney mel scale from 0 Hz to Nyquist and
/// area-normalised (each triangle scaled by `2 / bandwidth`).
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|i| i as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|k| mel_to_hz(min_mel + k as f64 * (max_mel - min_mel) / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
            let enorm = 2.0 / (upper - lower);

            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    (rising.min(falling).max(0.0) * enorm) as f32
                })
                .collect()
        })
        .collect()
}

/// Chroma filterbank, 12 rows (C first) by `n_fft / 2 + 1` columns.
///
/// Each FFT bin spreads over pitch classes with a Gaussian bump whose width
/// follows the bin spacing in semitones. Columns are L2-normalised, then
/// weighted by a Gaussian over octaves centred on octave 5 (width 2).
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize) -> Vec<Vec<f32>> {
    let n_chroma = N_CHROMA as f64;
    let n_bins = n_fft / 2 + 1;
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;

    // Semitone position of every FFT bin relative to A0; bin 0 (DC) sits 1.5 octaves below bin 1
    let mut frqbins = vec![0.0f64; n_fft];
    for (i, slot) in frqbins.iter_mut().enumerate().skip(1) {
        let hz = i as f64 * sample_rate as f64 / n_fft as f64;
        *slot = n_chroma * (hz / A0_HZ).log2();
    }
    if n_fft > 1 {
        frqbins[0] = frqbins[1] - 1.5 * n_chroma;
    }

    let binwidth: Vec<f64> = (0..n_fft)
        .map(|i| {
            if i + 1 < n_fft {
                (frqbins[i + 1] - frqbins[i]).max(1.0)
            } else {
                1.0
            }
        })
        .collect();

    let half = (n_chroma / 2.0).round();
    let mut weights = vec![vec![0.0f64; n_bins]; N_CHROMA];

    for i in 0..n_bins {
        let mut column = [0.0f64; N_CHROMA];
        for (c, value) in column.iter_mut().enumerate() {
            // Signed distance in semitones, wrapped into [-6, 6)
            let d = (frqbins[i] - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            *value = (-0.5 * (2.0 * d / binwidth[i]).powi(2)).exp();
        }

        let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
        let octave_weight =
            (-0.5 * ((frqbins[i] / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();

        for (c, value) in column.iter().enumerate() {
            let normalized = if norm > f64::MIN_POSITIVE { value / norm } else { *value };
            weights[c][i] = normalized * octave_weight;
        }
    }

    // Rotate so row 0 is C instead of A
    weights.rotate_left(3);

    weights
        .into_iter()
        .map(|row| row.into_iter().map(|v| v as f32).collect())
        .collect()
}

/// Apply a filterbank to one spectrum column
pub fn apply_filterbank(filterbank: &[Vec<f32>], column: &[f32]) -> Vec<f32> {
    filterbank
        .iter()
        .map(|row| row.iter().zip(column).map(|(w, x)| w * x).sum())
        .collect()
}

/// Power to decibels relative to 1.0, floored at `amin`
pub fn power_to_db(power: f32, amin: f32) -> f32 {
    10.0 * power.max(amin).log10()
}

/// Orthonormal DCT-II basis, `n_out` rows by `n_in` columns
pub fn dct_basis(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| {
                    let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n);
                    (scale * angle.cos()) as f32
                })
                .collect()
        })
        .collect()
}
