use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_BLOCK_SIZE: usize = 2048;
pub const DEFAULT_RECORD_SECONDS: f64 = 5.0;
pub const DEFAULT_OUTPUT_PATH: &str = "output.wav";
pub const DEFAULT_REDRAW_INTERVAL_MS: u64 = 5;
pub const DEFAULT_MAX_AMPLITUDE: f32 = 4000.0;

/// Capture parameters shared by every component of a session.
///
/// Built once from [`Settings`] and handed out by value; the producer side
/// (the sample source) and the consumer side (recorder or live display) must
/// be constructed from the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per block.
    pub block_size: usize,
    pub bits_per_sample: u16,
}

impl StreamConfig {
    pub fn new(sample_rate: u32, channels: u16, block_size: usize) -> Result<Self> {
        ensure!(sample_rate > 0, "sample rate must be positive");
        ensure!(channels > 0, "channel count must be positive");
        ensure!(block_size > 0, "block size must be positive");

        Ok(Self {
            sample_rate,
            channels,
            block_size,
            bits_per_sample: 16,
        })
    }

    /// Bytes per sample of a single channel.
    pub fn sample_width(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Interleaved samples in one block.
    pub fn samples_per_block(&self) -> usize {
        self.block_size * self.channels as usize
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_size: DEFAULT_BLOCK_SIZE,
            bits_per_sample: 16,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Capture sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Number of interleaved input channels
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Frames per captured block, also the FFT length
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Preferred audio input device name
    /// If None, uses system default device
    #[serde(default)]
    pub audio_device: Option<String>,

    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default = "default_record_seconds")]
    pub record_seconds: f64,

    #[serde(default = "default_redraw_interval_ms")]
    pub redraw_interval_ms: u64,

    /// Upper bound of the amplitude axis in the live plot
    #[serde(default = "default_max_amplitude")]
    pub max_amplitude: f32,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u16 {
    DEFAULT_CHANNELS
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_record_seconds() -> f64 {
    DEFAULT_RECORD_SECONDS
}

fn default_redraw_interval_ms() -> u64 {
    DEFAULT_REDRAW_INTERVAL_MS
}

fn default_max_amplitude() -> f32 {
    DEFAULT_MAX_AMPLITUDE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_size: DEFAULT_BLOCK_SIZE,
            audio_device: None,
            output_path: default_output_path(),
            record_seconds: DEFAULT_RECORD_SECONDS,
            redraw_interval_ms: DEFAULT_REDRAW_INTERVAL_MS,
            max_amplitude: DEFAULT_MAX_AMPLITUDE,
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, or from
    /// ~/.config/audioscope/config.toml when none is given.
    /// Returns default settings if the file doesn't exist or fails to parse.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match config_path() {
                Some(path) => path,
                None => {
                    tracing::warn!("could not determine config directory, using defaults");
                    return Self::default();
                }
            },
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => {
                    tracing::info!("loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    tracing::warn!("failed to parse {}: {:#}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!("no config file at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid settings file")
    }

    /// Save settings as TOML, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }

    pub fn stream_config(&self) -> Result<StreamConfig> {
        StreamConfig::new(self.sample_rate, self.channels, self.block_size)
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "audioscope").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_constants() {
        let config = Settings::default().stream_config().unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.block_size, 2048);
        assert_eq!(config.sample_width(), 2);
        assert_eq!(config.samples_per_block(), 4096);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::parse("sample_rate = 48000\naudio_device = \"USB Mic\"\n").unwrap();
        assert_eq!(settings.sample_rate, 48000);
        assert_eq!(settings.audio_device.as_deref(), Some("USB Mic"));
        assert_eq!(settings.channels, DEFAULT_CHANNELS);
        assert_eq!(settings.output_path, PathBuf::from("output.wav"));
    }

    #[test]
    fn test_rejects_zero_values() {
        let settings = Settings {
            block_size: 0,
            ..Settings::default()
        };
        assert!(settings.stream_config().is_err());
        assert!(StreamConfig::new(0, 2, 2048).is_err());
        assert!(StreamConfig::new(44100, 0, 2048).is_err());
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(Settings::parse("sample_rate = \"fast\"").is_err());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let path = std::env::temp_dir().join(format!("audioscope-missing-{}.toml", uuid::Uuid::new_v4()));
        assert_eq!(Settings::load(Some(&path)), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("audioscope-conf-{}.toml", uuid::Uuid::new_v4()));
        let settings = Settings {
            redraw_interval_ms: 40,
            max_amplitude: 1000.0,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(Some(&path)), settings);
        let _ = fs::remove_file(&path);
    }
}
