//! Synthetic impulse responses for the reverb
//!
//! A decaying noise burst: each sample of each channel is independent uniform noise in
//! [-1, 1) shaped by `(1 - i/len)^2`. Two independent channels give a wide stereo tail.

use crate::error::{AudioError, Result};
use rand::Rng;

/// Default impulse response length in seconds
pub const DEFAULT_IR_SECONDS: u32 = 3;

/// Planar multi-channel impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl ImpulseResponse {
    /// Wrap planar channel data
    ///
    /// # Errors
    /// Returns an error if there are no channels or they differ in length
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(AudioError::stage("reverb", "impulse response has no channels"));
        };
        let frames = first.len();
        if channels.iter().any(|channel| channel.len() != frames) {
            return Err(AudioError::stage("reverb", "impulse response channels differ in length"));
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Sample rate the response was generated for
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples of one channel
    ///
    /// # Panics
    /// Panics if `index >= channel_count()`
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Iterate over channels
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }
}

/// Generates decaying stereo noise bursts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpulseResponseSynthesizer {
    seconds: u32,
    channels: usize,
}

impl ImpulseResponseSynthesizer {
    /// Three-second stereo synthesizer
    pub fn new() -> Self {
        Self {
            seconds: DEFAULT_IR_SECONDS,
            channels: 2,
        }
    }

    /// Override the response length
    #[must_use]
    pub fn with_seconds(mut self, seconds: u32) -> Self {
        self.seconds = seconds;
        self
    }

    /// Response length in frames at a sample rate
    pub fn frames(&self, sample_rate: u32) -> usize {
        self.seconds as usize * sample_rate as usize
    }

    /// Synthesize with the thread-local RNG
    pub fn synthesize(&self, sample_rate: u32) -> ImpulseResponse {
        self.synthesize_with(sample_rate, &mut rand::thread_rng())
    }

    /// Synthesize from a caller-provided RNG
    pub fn synthesize_with<R: Rng + ?Sized>(&self, sample_rate: u32, rng: &mut R) -> ImpulseResponse {
        let length = self.frames(sample_rate);
        let channels = (0..self.channels)
            .map(|_| {
                (0..length)
                    .map(|i| {
                        let decay = 1.0 - i as f64 / length as f64;
                        let noise = rng.gen::<f64>() * 2.0 - 1.0;
                        (noise * decay * decay) as f32
                    })
                    .collect()
            })
            .collect();

        ImpulseResponse {
            channels,
            sample_rate,
        }
    }
}

impl Default for ImpulseResponseSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}
