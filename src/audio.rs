//! Audio capture, analysis and recording

mod block;
mod queue;
mod recorder;
mod signal;
mod source;
mod spectrum;

pub use block::{AudioBlock, Recording};
pub use queue::BlockQueue;
pub use recorder::{
    AudioDeviceInfo, Recorder, check_wav_format, list_devices, read_wav, required_blocks, save_wav,
};
pub use signal::{sine_wave, to_pcm};
pub use source::{BlockStatus, CaptureError, CaptureStream, SampleSource};
pub use spectrum::{SpectrumAnalyzer, amplitude_spectrum, frequencies};
