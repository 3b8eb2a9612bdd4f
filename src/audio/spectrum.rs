// Short-time Fourier transform
// Centered, Hann-windowed magnitude spectrogram shared by all spectral features

use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::audio::AudioError;

/// How a signal is extended before centered framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    /// Pad with zeros
    Zero,
    /// Repeat the first/last sample
    Edge,
}

/// Pad `samples` by `frame_length / 2` on both sides so frame `t` is centered on sample `t * hop`
pub fn pad_centered(samples: &[f32], frame_length: usize, mode: PadMode) -> Vec<f32> {
    let pad = frame_length / 2;
    let (head, tail) = match mode {
        PadMode::Zero => (0.0, 0.0),
        PadMode::Edge => (
            samples.first().copied().unwrap_or(0.0),
            samples.last().copied().unwrap_or(0.0),
        ),
    };

    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, head);
    padded.extend_from_slice(samples);
    padded.resize(padded.len() + pad, tail);
    padded
}

/// Iterate centered frames of `padded` (see `pad_centered`)
pub fn frames(padded: &[f32], frame_length: usize, hop_length: usize) -> impl Iterator<Item = &[f32]> {
    padded.windows(frame_length).step_by(hop_length.max(1))
}

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    // Guard against empty arrays
    if n == 0 {
        return Vec::new();
    }

    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Magnitude spectrogram: one `n_fft / 2 + 1` bin column per frame
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub frames: Vec<Vec<f32>>,
}

impl Spectrogram {
    /// Compute a centered, zero-padded STFT magnitude spectrogram.
    /// Frame count is `1 + samples.len() / hop_length`.
    pub fn compute(
        samples: &[f32],
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
    ) -> Result<Self, AudioError> {
        if n_fft < 2 || hop_length == 0 {
            return Err(AudioError::InvalidData(format!(
                "invalid STFT parameters n_fft={} hop={}",
                n_fft, hop_length
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft: Arc<dyn RealToComplex<f32>> = planner.plan_fft_forward(n_fft);
        let window = hann_window(n_fft);

        let padded = pad_centered(samples, n_fft, PadMode::Zero);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();
        let mut columns = Vec::with_capacity(samples.len() / hop_length + 1);

        for frame in frames(&padded, n_fft, hop_length) {
            for ((dst, &src), &w) in input.iter_mut().zip(frame).zip(window.iter()) {
                *dst = src * w;
            }

            fft.process(&mut input, &mut spectrum)
                .map_err(|e| AudioError::InvalidData(format!("FFT failed: {}", e)))?;

            // Convert complex spectrum to magnitudes
            columns.push(spectrum.iter().map(|c| c.norm()).collect());
        }

        Ok(Spectrogram {
            sample_rate,
            n_fft,
            hop_length,
            frames: columns,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = hann_window(100);

        // Window should taper at edges
        assert!(window[0] < 0.1);
        assert!(window[99] < 0.1);
        assert!(window[50] > 0.9); // Peak in middle
    }

    #[test]
    fn test_pad_centered_modes() {
        let samples = [1.0, 2.0, 3.0];

        let zero = pad_centered(&samples, 4, PadMode::Zero);
        assert_eq!(zero, vec![0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);

        let edge = pad_centered(&samples, 4, PadMode::Edge);
        assert_eq!(edge, vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_frame_count_matches_centered_stft() {
        let samples = vec![0.0f32; 10_000];
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512).unwrap();

        assert_eq!(spec.num_frames(), 1 + 10_000 / 512);
        assert_eq!(spec.frames[0].len(), spec.num_bins());
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sr = 22050;
        let n_fft = 2048;
        // Exactly on bin 100
        let freq = 100.0 * sr as f32 / n_fft as f32;
        let samples: Vec<f32> = (0..8192)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();

        let spec = Spectrogram::compute(&samples, sr, n_fft, 512).unwrap();
        let middle = &spec.frames[spec.num_frames() / 2];
        let peak_bin = middle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        assert_eq!(peak_bin, 100);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Spectrogram::compute(&[0.0; 16], 22050, 2048, 0).is_err());
    }
}
