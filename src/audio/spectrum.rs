//! Amplitude spectrum of captured blocks
//!
//! The spectrum of N real samples has `N / 2 + 1` bins (DC up to Nyquist).
//! Each bin holds the FFT magnitude divided by the bin count, so a full-scale
//! input lands in the same range regardless of block size.

use super::block::AudioBlock;
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Number of bins in the spectrum of `len` real samples
pub fn bin_count(len: usize) -> usize {
    len / 2 + 1
}

/// Center frequency of every bin for a block of `block_size` frames.
pub fn frequencies(block_size: usize, sample_rate: u32) -> Vec<f32> {
    if block_size == 0 {
        return Vec::new();
    }

    let bin_width = sample_rate as f32 / block_size as f32;
    (0..bin_count(block_size))
        .map(|k| k as f32 * bin_width)
        .collect()
}

/// Normalized magnitude spectrum of a single-channel signal.
///
/// Plans a fresh FFT each call; use [`SpectrumAnalyzer`] when the length is
/// fixed.
pub fn amplitude_spectrum(samples: &[i16]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let fft = FftPlanner::new().plan_fft_forward(samples.len());
    magnitudes(fft.as_ref(), samples)
}

fn magnitudes(fft: &dyn Fft<f32>, samples: &[i16]) -> Vec<f32> {
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .map(|&s| Complex::new(s as f32, 0.0))
        .collect();

    fft.process(&mut buffer);

    // Real input: bins above N/2 mirror the lower half
    let bins = bin_count(samples.len());
    buffer[..bins]
        .iter()
        .map(|c| c.norm() / bins as f32)
        .collect()
}

/// Spectrum computer for blocks of one fixed size
///
/// Holds the planned FFT so the live display does not re-plan every redraw.
pub struct SpectrumAnalyzer {
    block_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(block_size: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(block_size);
        Self { block_size, fft }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Spectrum of a single-channel sample slice.
    ///
    /// Slices of a different length than the planned size fall back to a
    /// one-off plan.
    pub fn spectrum(&self, samples: &[i16]) -> Vec<f32> {
        if samples.len() == self.block_size && !samples.is_empty() {
            magnitudes(self.fft.as_ref(), samples)
        } else {
            amplitude_spectrum(samples)
        }
    }

    /// Average the block's channels, then take its spectrum.
    pub fn block_spectrum(&self, block: &AudioBlock) -> Vec<f32> {
        let mono = block.channel_average();
        self.spectrum(mono.samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::signal::{sine_samples, to_pcm};

    #[test]
    fn test_bin_count_for_various_lengths() {
        for n in [1usize, 2, 3, 7, 64, 511, 512, 2048] {
            let samples: Vec<i16> = (0..n).map(|i| (i as i16).wrapping_mul(37)).collect();
            let spectrum = amplitude_spectrum(&samples);
            assert_eq!(spectrum.len(), n / 2 + 1, "length for n={}", n);
            assert!(spectrum.iter().all(|&m| m >= 0.0));
        }
    }

    #[test]
    fn test_silence_produces_zero_spectrum() {
        let spectrum = amplitude_spectrum(&[0; 2048]);
        assert_eq!(spectrum.len(), 1025);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(amplitude_spectrum(&[]).is_empty());
        assert!(frequencies(0, 44100).is_empty());
    }

    #[test]
    fn test_dc_normalization() {
        // DC of N samples of value v has magnitude N * v
        let spectrum = amplitude_spectrum(&[100; 8]);
        assert_eq!(spectrum.len(), 5);
        assert!((spectrum[0] - 800.0 / 5.0).abs() < 1e-3);
        assert!(spectrum[1..].iter().all(|&m| m < 1e-3));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        // 64 cycles per 2048 samples lands exactly on bin 64
        let rate = 44100;
        let frequency = 64.0 * rate as f32 / 2048.0;
        let samples = to_pcm(&sine_samples(2048, 1000.0, frequency, rate));
        assert_eq!(samples.len(), 2048);

        let spectrum = amplitude_spectrum(&samples);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);

        let freqs = frequencies(2048, rate);
        assert!((freqs[peak] - frequency).abs() < 1e-2);
    }

    #[test]
    fn test_frequency_axis() {
        let freqs = frequencies(2048, 44100);
        assert_eq!(freqs.len(), 1025);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1024] - 22050.0).abs() < 1e-2);
    }

    #[test]
    fn test_analyzer_matches_free_function() {
        let analyzer = SpectrumAnalyzer::new(16);
        let samples: Vec<i16> = (0..16).map(|i| i * 100 - 700).collect();
        assert_eq!(analyzer.spectrum(&samples), amplitude_spectrum(&samples));
        // Different length still works
        assert_eq!(analyzer.spectrum(&samples[..10]).len(), 6);
    }

    #[test]
    fn test_block_spectrum_averages_channels() {
        let analyzer = SpectrumAnalyzer::new(4);
        let block = AudioBlock::new(vec![10, 30, 10, 30, 10, 30, 10, 30], 2);
        let spectrum = analyzer.block_spectrum(&block);
        assert_eq!(spectrum, amplitude_spectrum(&[20, 20, 20, 20]));
    }
}
