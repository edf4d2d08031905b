//! Periodically redrawn amplitude spectrum

use super::plot::{Axes, PlotSurface};
use crate::audio::{BlockQueue, SpectrumAnalyzer, frequencies};
use crate::conf::StreamConfig;
use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

/// Consumer that turns queued blocks into spectrum plots
pub struct LiveDisplay {
    queue: BlockQueue,
    analyzer: SpectrumAnalyzer,
    frequencies: Vec<f32>,
    axes: Axes,
    redraws: u64,
}

impl LiveDisplay {
    /// The frequency axis is fixed here from the block size and sample rate;
    /// the amplitude axis spans `0..=max_amplitude`.
    pub fn new(queue: BlockQueue, config: StreamConfig, max_amplitude: f32) -> Self {
        let frequencies = frequencies(config.block_size, config.sample_rate);
        let nyquist = frequencies.last().copied().unwrap_or(0.0);

        Self {
            queue,
            analyzer: SpectrumAnalyzer::new(config.block_size),
            frequencies,
            axes: Axes::new(0.0, nyquist, 0.0, max_amplitude),
            redraws: 0,
        }
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Drain every queued block and return the spectrum of the newest one.
    ///
    /// Older blocks from the same drain are analyzed too but only the last
    /// result is kept.
    pub fn drain_latest(&mut self) -> Option<Vec<f32>> {
        let mut latest = None;
        while let Some(block) = self.queue.try_dequeue() {
            latest = Some(self.analyzer.block_spectrum(&block));
        }
        latest
    }

    /// One redraw cycle. Returns whether the plot changed.
    pub fn tick<S: PlotSurface>(&mut self, surface: &mut S) -> Result<bool> {
        let Some(spectrum) = self.drain_latest() else {
            return Ok(false);
        };

        surface.clear(&self.axes);
        surface.draw_line(&self.frequencies, &spectrum);
        surface.show()?;
        self.redraws += 1;
        Ok(true)
    }

    /// Redraw every `interval` until the surface closes or `check` fails.
    pub fn run<S, F>(&mut self, surface: &mut S, interval: Duration, mut check: F) -> Result<()>
    where
        S: PlotSurface,
        F: FnMut() -> Result<()>,
    {
        // Empty axes until the first block arrives
        surface.clear(&self.axes);
        surface.show()?;

        let mut next = Instant::now();
        while surface.is_open()? {
            check()?;
            if self.tick(surface)? {
                tracing::trace!(redraws = self.redraws, "spectrum redrawn");
            }

            next += interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                // Fell behind; don't try to catch up with a burst of redraws
                next = now;
            }
        }

        tracing::info!(redraws = self.redraws, "live display stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBlock, amplitude_spectrum};
    use anyhow::anyhow;

    #[derive(Default)]
    struct FakeSurface {
        open_polls: usize,
        close_after: usize,
        clears: Vec<Axes>,
        lines: Vec<(Vec<f32>, Vec<f32>)>,
        shows: usize,
    }

    impl PlotSurface for FakeSurface {
        fn is_open(&mut self) -> Result<bool> {
            self.open_polls += 1;
            Ok(self.open_polls <= self.close_after)
        }

        fn clear(&mut self, axes: &Axes) {
            self.clears.push(*axes);
            self.lines.clear();
        }

        fn draw_line(&mut self, xs: &[f32], ys: &[f32]) {
            self.lines.push((xs.to_vec(), ys.to_vec()));
        }

        fn show(&mut self) -> Result<()> {
            self.shows += 1;
            Ok(())
        }
    }

    fn config() -> StreamConfig {
        StreamConfig::new(8000, 2, 8).unwrap()
    }

    fn constant_block(value: i16) -> AudioBlock {
        AudioBlock::new(vec![value; 16], 2)
    }

    #[test]
    fn test_axes_are_fixed_from_config() {
        let display = LiveDisplay::new(BlockQueue::new(), config(), 4000.0);
        assert_eq!(display.frequencies().len(), 5);
        assert_eq!(display.axes(), &Axes::new(0.0, 4000.0, 0.0, 4000.0));
    }

    #[test]
    fn test_drain_keeps_only_last_spectrum() {
        let queue = BlockQueue::new();
        let mut display = LiveDisplay::new(queue.clone(), config(), 4000.0);

        queue.enqueue(constant_block(10));
        queue.enqueue(constant_block(20));
        queue.enqueue(constant_block(30));

        let spectrum = display.drain_latest().unwrap();
        assert_eq!(spectrum, amplitude_spectrum(&[30; 8]));
        assert!(queue.is_empty());
        assert!(display.drain_latest().is_none());
    }

    #[test]
    fn test_tick_without_blocks_keeps_plot() {
        let mut display = LiveDisplay::new(BlockQueue::new(), config(), 4000.0);
        let mut surface = FakeSurface::default();
        assert!(!display.tick(&mut surface).unwrap());
        assert_eq!(surface.shows, 0);
        assert!(surface.clears.is_empty());
    }

    #[test]
    fn test_tick_draws_latest_block() {
        let queue = BlockQueue::new();
        let mut display = LiveDisplay::new(queue.clone(), config(), 100.0);
        let mut surface = FakeSurface::default();

        queue.enqueue(constant_block(0));
        queue.enqueue(constant_block(400));
        assert!(display.tick(&mut surface).unwrap());

        assert_eq!(surface.shows, 1);
        assert_eq!(surface.lines.len(), 1);
        let (xs, ys) = &surface.lines[0];
        assert_eq!(xs, &display.frequencies().to_vec());
        // DC of eight 400s is 3200 / 5 bins; above the 100 range but not clamped
        assert!((ys[0] - 640.0).abs() < 1e-3);
        assert_eq!(display.redraws(), 1);
    }

    #[test]
    fn test_run_stops_when_surface_closes() {
        let queue = BlockQueue::new();
        let mut display = LiveDisplay::new(queue.clone(), config(), 4000.0);
        let mut surface = FakeSurface {
            close_after: 3,
            ..FakeSurface::default()
        };

        queue.enqueue(constant_block(5));
        display
            .run(&mut surface, Duration::from_millis(1), || Ok(()))
            .unwrap();

        assert_eq!(surface.open_polls, 4);
        // Initial empty frame plus one redraw
        assert_eq!(surface.shows, 2);
        assert_eq!(display.redraws(), 1);
    }

    #[test]
    fn test_run_propagates_capture_failure() {
        let mut display = LiveDisplay::new(BlockQueue::new(), config(), 4000.0);
        let mut surface = FakeSurface {
            close_after: usize::MAX,
            ..FakeSurface::default()
        };

        let result = display.run(&mut surface, Duration::from_millis(1), || {
            Err(anyhow!("input device disconnected"))
        });
        assert!(result.is_err());
    }
}
