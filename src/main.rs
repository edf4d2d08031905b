use anyhow::{Context, Result};
use audioscope::audio::{
    BlockQueue, CaptureStream, Recorder, SampleSource, SpectrumAnalyzer, check_wav_format,
    frequencies, list_devices, read_wav, required_blocks, save_wav, sine_wave, to_pcm,
};
use audioscope::conf::{Settings, StreamConfig, config_path};
use audioscope::display::{Axes, LiveDisplay, PixmapPlot, PlotSurface, PlotWindow};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "audioscope")]
#[command(about = "Live audio spectrum viewer and fixed-length WAV recorder")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.config/audioscope/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a fixed-length clip from the input device to a WAV file
    Record {
        /// Recording duration in seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Output WAV path, overwritten if it exists
        #[arg(long)]
        output: Option<PathBuf>,

        /// Input device name
        #[arg(long)]
        device: Option<String>,
    },

    /// Show the live amplitude spectrum of the input device
    Live {
        /// Redraw interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Upper bound of the amplitude axis
        #[arg(long)]
        max_amplitude: Option<f32>,

        /// Input device name
        #[arg(long)]
        device: Option<String>,
    },

    /// Write a generated sine tone as a mono 16-bit WAV file
    Tone {
        #[arg(long, default_value = "1")]
        seconds: f64,

        #[arg(long, default_value = "8000")]
        amplitude: f32,

        /// Tone frequency in Hz
        #[arg(long, default_value = "5000")]
        frequency: f32,

        #[arg(long, default_value = "tone.wav")]
        output: PathBuf,
    },

    /// Render the spectrum of the first block of a WAV file to PNG
    Plot {
        input: PathBuf,

        #[arg(long, default_value = "spectrum.png")]
        output: PathBuf,

        /// Upper bound of the amplitude axis
        #[arg(long)]
        max_amplitude: Option<f32>,
    },

    /// Print the effective settings as TOML
    Config {
        /// Write the effective settings to the settings file
        #[arg(long)]
        init: bool,
    },

    /// List available audio input devices
    Devices {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audioscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open the input device and feed every captured block into `queue`.
fn start_capture(config: StreamConfig, device: Option<&str>, queue: &BlockQueue) -> Result<CaptureStream> {
    let source = SampleSource::new(config, device).context("Failed to find audio input device")?;
    let producer = queue.clone();

    let stream = source
        .open(move |block, status| {
            if status.overflowed {
                tracing::warn!("input overflow, delivering block anyway");
            }
            producer.enqueue(block);
        })
        .with_context(|| format!("Failed to open input stream on {}", source.device_name()))?;

    Ok(stream)
}

fn record(settings: &Settings, seconds: f64, output: &Path) -> Result<()> {
    anyhow::ensure!(
        seconds.is_finite() && seconds >= 0.0,
        "recording duration must be a non-negative number of seconds, got {}",
        seconds
    );
    let config = settings.stream_config()?;
    // Fail before capturing anything the WAV file could not describe
    check_wav_format(config.channels, config.sample_width())?;
    let queue = BlockQueue::new();
    let required = required_blocks(&config, seconds);

    println!("Recording {:.1}s ({} blocks)...", seconds, required);

    let stream = start_capture(config, settings.audio_device.as_deref(), &queue)?;

    let pb = ProgressBar::new(required as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} blocks ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .progress_chars("#>-"),
    );

    let recorder = Recorder::new(queue, config);
    let recording = recorder.record_with(seconds, |captured, _| {
        stream.check()?;
        pb.set_position(captured as u64);
        Ok(())
    });
    stream.close();
    pb.finish_and_clear();
    let recording = recording?;

    save_wav(
        recording.samples(),
        output,
        recording.channels(),
        config.sample_width(),
        config.sample_rate,
    )?;

    println!(
        "Saved {} frames ({:.2}s) to {}",
        recording.frames(),
        recording.frames() as f64 / config.sample_rate as f64,
        output.display()
    );
    Ok(())
}

fn live(settings: &Settings, interval: Duration, max_amplitude: f32) -> Result<()> {
    let config = settings.stream_config()?;
    let queue = BlockQueue::new();

    let mut window = PlotWindow::open("audioscope: amplitude spectrum", 960, 540)
        .context("Failed to open plot window")?;
    let stream = start_capture(config, settings.audio_device.as_deref(), &queue)?;

    let mut display = LiveDisplay::new(queue, config, max_amplitude);
    display.run(&mut window, interval, || Ok(stream.check()?))
}

fn tone(seconds: f64, amplitude: f32, frequency: f32, rate: u32, output: &Path) -> Result<()> {
    let samples = to_pcm(&sine_wave(seconds, amplitude, frequency, rate));
    save_wav(&samples, output, 1, 2, rate)?;
    println!(
        "Wrote {} Hz tone ({} samples) to {}",
        frequency,
        samples.len(),
        output.display()
    );
    Ok(())
}

fn plot(input: &Path, output: &Path, max_amplitude: f32, block_size: usize) -> Result<()> {
    let (recording, spec) = read_wav(input)?;
    let block = recording.head(block_size);
    anyhow::ensure!(block.frames() > 0, "{} contains no audio", input.display());

    let analyzer = SpectrumAnalyzer::new(block.frames());
    let spectrum = analyzer.block_spectrum(&block);
    let freqs = frequencies(block.frames(), spec.sample_rate);
    let nyquist = freqs.last().copied().unwrap_or(0.0);

    let mut surface = PixmapPlot::new(960, 540)?;
    surface.clear(&Axes::new(0.0, nyquist, 0.0, max_amplitude));
    surface.draw_line(&freqs, &spectrum);
    surface.show()?;
    surface.save_png(output)?;

    println!("Wrote spectrum of {} to {}", input.display(), output.display());
    Ok(())
}

fn devices(format: OutputFormat) -> Result<()> {
    let devices = list_devices()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        OutputFormat::Text => {
            println!("Available Audio Devices:");
            println!(
                "{:<30} {:<10} {:<10} {:<20} Formats",
                "Name", "Default", "Channels", "Sample Rates"
            );
            println!("{}", "-".repeat(90));

            for device in devices {
                let default_str = if device.is_default { "YES" } else { "NO" };
                let sample_rates = device
                    .supported_sample_rates
                    .iter()
                    .take(3)
                    .map(|sr| sr.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");

                let formats = device
                    .supported_formats
                    .iter()
                    .take(2)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");

                let name: String = device.name.chars().take(30).collect();
                println!(
                    "{:<30} {:<10} {:<10} {:<20} {}",
                    name, default_str, device.max_channels, sample_rates, formats
                );
            }
        }
    }

    Ok(())
}

fn show_config(settings: &Settings, path: Option<&Path>, init: bool) -> Result<()> {
    if init {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path().context("Could not determine config directory")?,
        };
        settings.save(&path)?;
        println!("Wrote settings to {}", path.display());
    } else {
        print!("{}", toml::to_string_pretty(settings)?);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref());

    match cli.command {
        Commands::Record {
            duration,
            output,
            device,
        } => {
            if device.is_some() {
                settings.audio_device = device;
            }
            let seconds = duration.unwrap_or(settings.record_seconds);
            let output = output.unwrap_or_else(|| settings.output_path.clone());
            record(&settings, seconds, &output)
        }

        Commands::Live {
            interval_ms,
            max_amplitude,
            device,
        } => {
            if device.is_some() {
                settings.audio_device = device;
            }
            let interval = Duration::from_millis(interval_ms.unwrap_or(settings.redraw_interval_ms));
            live(
                &settings,
                interval,
                max_amplitude.unwrap_or(settings.max_amplitude),
            )
        }

        Commands::Tone {
            seconds,
            amplitude,
            frequency,
            output,
        } => tone(seconds, amplitude, frequency, settings.sample_rate, &output),

        Commands::Plot {
            input,
            output,
            max_amplitude,
        } => plot(
            &input,
            &output,
            max_amplitude.unwrap_or(settings.max_amplitude),
            settings.block_size,
        ),

        Commands::Config { init } => show_config(&settings, cli.config.as_deref(), init),

        Commands::Devices { format } => devices(format),
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
