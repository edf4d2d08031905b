//! Live audio spectrum viewer and fixed-length WAV recorder
//!
//! Captured blocks flow from a [`audio::SampleSource`] through a
//! [`audio::BlockQueue`] to one consumer: either a [`audio::Recorder`] that
//! assembles a fixed-duration clip, or a [`display::LiveDisplay`] that redraws
//! the amplitude spectrum of the newest block.

pub mod audio;
pub mod conf;
pub mod display;
