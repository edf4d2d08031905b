//! Interleaved sample blocks and recordings
//!
//! A block is what one capture callback produces: `frames x channels` signed
//! 16-bit samples, stored interleaved (frame-major).

/// One fixed-size chunk of interleaved audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    samples: Vec<i16>,
    channels: u16,
}

impl AudioBlock {
    /// Wrap interleaved samples.
    ///
    /// # Panics
    /// If `channels` is zero or the sample count is not a whole number of frames.
    pub fn new(samples: Vec<i16>, channels: u16) -> Self {
        assert!(channels > 0, "audio block needs at least one channel");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "{} samples do not form whole {}-channel frames",
            samples.len(),
            channels
        );
        Self { samples, channels }
    }

    /// A block of digital silence
    pub fn silent(frames: usize, channels: u16) -> Self {
        Self::new(vec![0; frames * channels as usize], channels)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Reduce to a single channel by averaging each frame.
    ///
    /// The mean is taken over `i32` sums and rounded half away from zero, so
    /// two full-scale channels cannot overflow. Any channel count is accepted.
    pub fn channel_average(&self) -> AudioBlock {
        if self.channels == 1 {
            return self.clone();
        }

        let channels = self.channels as usize;
        let averaged = self
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum as f64 / channels as f64).round() as i16
            })
            .collect();

        AudioBlock::new(averaged, 1)
    }
}

/// All blocks consumed by one recording session, concatenated in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    samples: Vec<i16>,
    channels: u16,
}

impl Recording {
    pub fn new(samples: Vec<i16>, channels: u16) -> Self {
        Self::from(AudioBlock::new(samples, channels))
    }

    /// Concatenate blocks. All blocks must share `channels`.
    pub fn from_blocks<I>(channels: u16, blocks: I) -> Self
    where
        I: IntoIterator<Item = AudioBlock>,
    {
        let mut samples = Vec::new();
        for block in blocks {
            assert_eq!(
                block.channels(),
                channels,
                "block channel count differs from the recording"
            );
            samples.extend_from_slice(block.samples());
        }
        Self { samples, channels }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Leading `frames` frames as a block, e.g. for a one-off spectrum
    pub fn head(&self, frames: usize) -> AudioBlock {
        let len = (frames * self.channels as usize).min(self.samples.len());
        AudioBlock::new(self.samples[..len].to_vec(), self.channels)
    }
}

impl From<AudioBlock> for Recording {
    fn from(block: AudioBlock) -> Self {
        Self {
            channels: block.channels,
            samples: block.samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(left: i16, right: i16, frames: usize) -> AudioBlock {
        let samples = (0..frames).flat_map(|_| [left, right]).collect();
        AudioBlock::new(samples, 2)
    }

    #[test]
    fn test_average_of_constant_channels() {
        let mono = stereo(100, 301, 2048).channel_average();
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.frames(), 2048);
        // 200.5 rounds away from zero
        assert!(mono.samples().iter().all(|&s| s == 201));
    }

    #[test]
    fn test_average_does_not_overflow() {
        let mono = stereo(i16::MAX, i16::MAX, 4).channel_average();
        assert!(mono.samples().iter().all(|&s| s == i16::MAX));

        let mono = stereo(i16::MIN, i16::MIN, 4).channel_average();
        assert!(mono.samples().iter().all(|&s| s == i16::MIN));

        let mono = stereo(i16::MIN, i16::MAX, 4).channel_average();
        // -0.5 rounds to -1
        assert!(mono.samples().iter().all(|&s| s == -1));
    }

    #[test]
    fn test_average_any_channel_count() {
        let block = AudioBlock::new(vec![3, 6, 9, -3, -6, -10], 3);
        assert_eq!(block.frames(), 2);
        assert_eq!(block.channel_average().samples(), &[6, -6]);
    }

    #[test]
    fn test_mono_average_is_identity() {
        let block = AudioBlock::new(vec![1, -2, 3], 1);
        assert_eq!(block.channel_average(), block);
    }

    #[test]
    #[should_panic]
    fn test_ragged_block_panics() {
        let _ = AudioBlock::new(vec![1, 2, 3], 2);
    }

    #[test]
    fn test_recording_concatenates_in_order() {
        let recording = Recording::from_blocks(
            2,
            vec![
                AudioBlock::new(vec![1, 2, 3, 4], 2),
                AudioBlock::new(vec![5, 6], 2),
            ],
        );
        assert_eq!(recording.samples(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(recording.frames(), 3);
        assert_eq!(recording.head(2).samples(), &[1, 2, 3, 4]);
        assert_eq!(recording.head(10).frames(), 3);
    }
}
