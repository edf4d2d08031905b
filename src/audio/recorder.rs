//! Fixed-duration recording
//!
//! Drains the block queue once enough audio for the requested duration has
//! been captured, and persists recordings as canonical PCM WAV files.

use super::block::Recording;
use super::queue::BlockQueue;
use crate::conf::StreamConfig;
use anyhow::{Context, Result, anyhow, ensure};
use cpal::traits::{DeviceTrait, HostTrait};
use hound::{WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long the recorder waits on the queue between progress checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Channel counts a canonical PCM WAV header can describe
pub const WAV_CHANNELS: std::ops::RangeInclusive<u16> = 1..=2;

/// Sample widths in bytes a canonical PCM WAV header can describe
pub const WAV_SAMPLE_WIDTHS: std::ops::RangeInclusive<u16> = 1..=2;

/// Blocks needed to cover `seconds` of audio, rounded up to whole blocks.
pub fn required_blocks(config: &StreamConfig, seconds: f64) -> usize {
    let frames = config.sample_rate as f64 * seconds.max(0.0);
    (frames / config.block_size as f64).ceil() as usize
}

/// Sole consumer of a block queue for the duration of one recording
pub struct Recorder {
    queue: BlockQueue,
    config: StreamConfig,
}

impl Recorder {
    pub fn new(queue: BlockQueue, config: StreamConfig) -> Self {
        Self { queue, config }
    }

    /// Block until `seconds` of audio are queued and return them.
    pub fn record(&self, seconds: f64) -> Result<Recording> {
        self.record_with(seconds, |_, _| Ok(()))
    }

    /// Like [`Recorder::record`], calling `on_poll(captured, required)` after
    /// every wait. An error from the hook aborts the recording.
    pub fn record_with<F>(&self, seconds: f64, mut on_poll: F) -> Result<Recording>
    where
        F: FnMut(usize, usize) -> Result<()>,
    {
        ensure!(
            seconds.is_finite() && seconds >= 0.0,
            "recording duration must be a non-negative number of seconds, got {}",
            seconds
        );
        let required = required_blocks(&self.config, seconds);
        tracing::debug!(required, seconds, "waiting for blocks");

        loop {
            let ready = self.queue.wait_for_len(required, POLL_INTERVAL);
            on_poll(self.queue.len().min(required), required)?;
            if ready {
                break;
            }
        }

        // Blocks captured after the threshold stay queued
        let blocks = (0..required).map_while(|_| self.queue.try_dequeue());
        let recording = Recording::from_blocks(self.config.channels, blocks);

        tracing::info!(
            blocks = required,
            frames = recording.frames(),
            "recording assembled"
        );
        Ok(recording)
    }
}

/// Fails unless `channels` and `sample_width` fit a plain 16-byte `fmt `
/// chunk with the PCM format tag.
///
/// hound switches to `WAVE_FORMAT_EXTENSIBLE` above two channels or 16 bits.
pub fn check_wav_format(channels: u16, sample_width: u16) -> Result<()> {
    ensure!(
        WAV_CHANNELS.contains(&channels),
        "PCM WAV output supports 1 or 2 channels, got {}",
        channels
    );
    ensure!(
        WAV_SAMPLE_WIDTHS.contains(&sample_width),
        "PCM WAV output supports 1 or 2 byte samples, got {}",
        sample_width
    );
    Ok(())
}

/// Write interleaved samples as an uncompressed PCM WAV file.
///
/// `sample_width` is in bytes. 16-bit output stores the samples unchanged.
/// 8-bit output is rescaled: each sample keeps its high byte. The file is
/// written beside `path` under a temporary name and renamed into place, so
/// an existing file is replaced only by a complete one.
pub fn save_wav<P: AsRef<Path>>(
    samples: &[i16],
    path: P,
    channels: u16,
    sample_width: u16,
    rate: u32,
) -> Result<()> {
    let path = path.as_ref();
    check_wav_format(channels, sample_width)?;
    ensure!(
        samples.len() % channels as usize == 0,
        "{} samples do not form whole {}-channel frames",
        samples.len(),
        channels
    );

    let spec = WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: sample_width * 8,
        sample_format: hound::SampleFormat::Int,
    };

    let temp_path = temp_path_for(path);
    if let Err(e) = write_samples(&temp_path, spec, samples) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.context(format!("Failed to write WAV file: {}", path.display())));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("Failed to move WAV file into place: {}", path.display()));
    }

    tracing::info!(
        path = %path.display(),
        channels,
        rate,
        frames = samples.len() / channels as usize,
        "saved WAV"
    );
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording.wav".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}

fn write_samples(path: &Path, spec: WavSpec, samples: &[i16]) -> Result<()> {
    let mut writer = WavWriter::create(path, spec)?;
    match spec.bits_per_sample {
        8 => {
            for &sample in samples {
                writer.write_sample((sample >> 8) as i8)?;
            }
        }
        _ => {
            for &sample in samples {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Read a 16-bit PCM WAV file back into a recording.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Recording, WavSpec)> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(anyhow!(
            "{}: expected 16-bit PCM, found {} bits {:?}",
            path.display(),
            spec.bits_per_sample,
            spec.sample_format
        ));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to decode WAV samples: {}", path.display()))?;
    ensure!(
        spec.channels > 0 && samples.len() % spec.channels as usize == 0,
        "{}: truncated frame in sample data",
        path.display()
    );

    Ok((Recording::new(samples, spec.channels), spec))
}

/// Information about an available audio input device
#[derive(Debug, Serialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub max_channels: u16,
    pub supported_sample_rates: Vec<u32>,
    pub supported_formats: Vec<String>,
}

/// List all available audio input devices
pub fn list_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let devices = host.input_devices()?;
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_infos = Vec::new();

    for device in devices {
        let name = device.name().unwrap_or("Unknown Device".to_string());
        let is_default = default_name.as_deref() == Some(name.as_str());

        let configs: Vec<_> = match device.supported_input_configs() {
            Ok(configs) => configs.collect(),
            Err(e) => {
                tracing::warn!("skipping configs of {}: {}", name, e);
                Vec::new()
            }
        };

        let mut supported_sample_rates: Vec<u32> =
            configs.iter().map(|c| c.max_sample_rate().0).collect();
        supported_sample_rates.sort_unstable();
        supported_sample_rates.dedup();

        let mut supported_formats: Vec<String> =
            configs.iter().map(|c| c.sample_format().to_string()).collect();
        supported_formats.dedup();

        device_infos.push(AudioDeviceInfo {
            name,
            is_default,
            max_channels: configs.iter().map(|c| c.channels()).max().unwrap_or(0),
            supported_sample_rates,
            supported_formats,
        });
    }

    Ok(device_infos)
}
