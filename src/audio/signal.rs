//! Test tone generation

use std::f64::consts::PI;

/// Harmonic tone `amplitude * sin(2π·i·f/rate)` lasting `seconds`.
///
/// The sample count is `floor(rate * seconds)`.
pub fn sine_wave(seconds: f64, amplitude: f32, frequency: f32, rate: u32) -> Vec<f32> {
    let count = (rate as f64 * seconds).max(0.0) as usize;
    sine_samples(count, amplitude, frequency, rate)
}

/// Exactly `count` samples of the same tone.
pub fn sine_samples(count: usize, amplitude: f32, frequency: f32, rate: u32) -> Vec<f32> {
    // Phase in f64 so long tones don't drift
    let step = 2.0 * PI * frequency as f64 / rate as f64;
    (0..count)
        .map(|i| amplitude * (i as f64 * step).sin() as f32)
        .collect()
}

/// Round and saturate to 16-bit PCM.
pub fn to_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| s.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}
