//! Live capture from an input device
//!
//! Wraps a cpal input stream. Device callbacks arrive in whatever size the
//! backend chooses; [`BlockAssembler`] re-chunks them so the consumer sees one
//! call per block of exactly `block_size` frames.

use super::block::AudioBlock;
use crate::conf::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No default input device found")]
    NoDevice,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Failed to query input configuration: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(SampleFormat),

    #[error("Failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("Failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Input device disconnected")]
    Disconnected,
}

/// Per-block device status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStatus {
    /// The backend reported a non-fatal error (typically an overrun) since the
    /// previous block. The block is delivered regardless.
    pub overflowed: bool,
}

/// Collects interleaved samples and emits whole blocks
///
/// An anomaly reported with a chunk is latched until the next block is
/// emitted and then cleared.
pub struct BlockAssembler {
    channels: u16,
    block_len: usize,
    pending: Vec<i16>,
    overflowed: bool,
}

impl BlockAssembler {
    pub fn new(config: &StreamConfig) -> Self {
        let block_len = config.samples_per_block();
        Self {
            channels: config.channels,
            block_len,
            pending: Vec::with_capacity(block_len),
            overflowed: false,
        }
    }

    /// Append samples, calling `emit` once for every block completed.
    ///
    /// `anomaly` marks the first block emitted from here on as overflowed.
    pub fn push<I, F>(&mut self, samples: I, anomaly: bool, mut emit: F)
    where
        I: IntoIterator<Item = i16>,
        F: FnMut(AudioBlock, BlockStatus),
    {
        self.overflowed |= anomaly;
        for sample in samples {
            self.pending.push(sample);
            if self.pending.len() == self.block_len {
                let block = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_len));
                let status = BlockStatus {
                    overflowed: std::mem::take(&mut self.overflowed),
                };
                emit(AudioBlock::new(block, self.channels), status);
            }
        }
    }

    /// Samples waiting for the rest of their block
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Default)]
struct StreamState {
    anomaly: AtomicBool,
    disconnected: AtomicBool,
}

/// An input device bound to a stream configuration
pub struct SampleSource {
    device: Device,
    config: StreamConfig,
}

impl SampleSource {
    /// Resolve `device_name` among the host's input devices, or take the
    /// default input device when no name is given.
    pub fn new(config: StreamConfig, device_name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        Ok(Self { device, config })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Start capturing. `on_block` runs on the audio thread once per block.
    ///
    /// The returned guard owns the stream; callbacks stop when it is dropped.
    pub fn open<F>(&self, on_block: F) -> Result<CaptureStream, CaptureError>
    where
        F: FnMut(AudioBlock, BlockStatus) + Send + 'static,
    {
        let state = Arc::new(StreamState::default());
        let format = self.device.default_input_config()?.sample_format();

        let stream = match format {
            SampleFormat::I8 => self.build_stream::<i8, F>(on_block, state.clone())?,
            SampleFormat::I16 => self.build_stream::<i16, F>(on_block, state.clone())?,
            SampleFormat::I32 => self.build_stream::<i32, F>(on_block, state.clone())?,
            SampleFormat::U8 => self.build_stream::<u8, F>(on_block, state.clone())?,
            SampleFormat::U16 => self.build_stream::<u16, F>(on_block, state.clone())?,
            SampleFormat::U32 => self.build_stream::<u32, F>(on_block, state.clone())?,
            SampleFormat::F32 => self.build_stream::<f32, F>(on_block, state.clone())?,
            SampleFormat::F64 => self.build_stream::<f64, F>(on_block, state.clone())?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };

        stream.play()?;

        tracing::info!(
            device = %self.device_name(),
            sample_rate = self.config.sample_rate,
            channels = self.config.channels,
            block_size = self.config.block_size,
            native_format = %format,
            "input stream opened"
        );

        Ok(CaptureStream { stream, state })
    }

    fn build_stream<T, F>(
        &self,
        mut on_block: F,
        state: Arc<StreamState>,
    ) -> Result<cpal::Stream, CaptureError>
    where
        T: SizedSample + Send + 'static,
        i16: FromSample<T>,
        F: FnMut(AudioBlock, BlockStatus) + Send + 'static,
    {
        let stream_config = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut assembler = BlockAssembler::new(&self.config);
        let data_state = state.clone();

        let stream = self.device.build_input_stream(
            &stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let anomaly = data_state.anomaly.swap(false, Ordering::AcqRel);
                let samples = data.iter().map(|&s| -> i16 { cpal::Sample::from_sample(s) });
                assembler.push(samples, anomaly, &mut on_block);
            },
            move |err| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    tracing::error!("input device disconnected");
                    state.disconnected.store(true, Ordering::Release);
                }
                other => {
                    tracing::warn!("input stream error: {}", other);
                    state.anomaly.store(true, Ordering::Release);
                }
            },
            None,
        )?;

        Ok(stream)
    }
}

/// Running input stream
///
/// Stops the device when dropped, including on early return or unwind.
pub struct CaptureStream {
    stream: cpal::Stream,
    state: Arc<StreamState>,
}

impl CaptureStream {
    /// Fails once the device has gone away.
    pub fn check(&self) -> Result<(), CaptureError> {
        if self.state.disconnected.load(Ordering::Acquire) {
            Err(CaptureError::Disconnected)
        } else {
            Ok(())
        }
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!("could not pause input stream: {}", e);
        }
        tracing::info!("input stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> StreamConfig {
        StreamConfig::new(8000, 2, 4).unwrap()
    }

    #[test]
    fn test_assembler_emits_exact_blocks() {
        let mut assembler = BlockAssembler::new(&small_config());
        let mut blocks = Vec::new();

        // Uneven callback sizes: 5, 7, 1, 11 samples
        let mut next = 0i16;
        for len in [5, 7, 1, 11] {
            let chunk: Vec<i16> = (next..next + len).collect();
            next += len;
            assembler.push(chunk, false, |b, status| {
                assert!(!status.overflowed);
                blocks.push(b);
            });
        }

        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.frames() == 4 && b.channels() == 2));
        let flat: Vec<i16> = blocks.iter().flat_map(|b| b.samples().to_vec()).collect();
        assert_eq!(flat, (0..24).collect::<Vec<_>>());
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_assembler_keeps_partial_block() {
        let mut assembler = BlockAssembler::new(&small_config());
        let mut emitted = 0;
        assembler.push(vec![1; 13], false, |_, _| emitted += 1);
        assert_eq!(emitted, 1);
        assert_eq!(assembler.pending(), 5);
    }

    #[test]
    fn test_anomaly_marks_next_block_only() {
        let mut assembler = BlockAssembler::new(&small_config());
        let mut statuses = Vec::new();

        // Half a block, then an anomaly arrives with the rest of it
        assembler.push(vec![1; 4], false, |_, s| statuses.push(s.overflowed));
        assert!(statuses.is_empty());
        assembler.push(vec![2; 4], true, |_, s| statuses.push(s.overflowed));
        assert_eq!(statuses, vec![true]);

        // Cleared once delivered
        assembler.push(vec![3; 16], false, |_, s| statuses.push(s.overflowed));
        assert_eq!(statuses, vec![true, false, false]);
    }

    #[test]
    fn test_anomaly_waits_for_a_block() {
        let mut assembler = BlockAssembler::new(&small_config());
        let mut blocks = Vec::new();

        // Reported while no block completes
        assembler.push(vec![7; 3], true, |b, s| blocks.push((b, s)));
        assembler.push(Vec::new(), false, |b, s| blocks.push((b, s)));
        assert!(blocks.is_empty());

        // The block is still delivered, carrying the flag
        assembler.push(vec![7; 13], false, |b, s| blocks.push((b, s)));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].1.overflowed);
        assert_eq!(blocks[0].0.samples(), &[7; 8]);
        assert!(!blocks[1].1.overflowed);
    }

    #[test]
    fn test_sample_conversion_to_i16() {
        let from_float: i16 = cpal::Sample::from_sample(0.5f32);
        assert!((16383..=16384).contains(&from_float));
        let from_unsigned: i16 = cpal::Sample::from_sample(32768u16);
        assert_eq!(from_unsigned, 0);
    }
}
