/// Audio-related types
use crate::error::{MasteringError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::CD_QUALITY
    }
}

/// Decoded, immutable multi-channel audio
///
/// Samples are stored planar (one `Vec` per channel) as f32 in the range [-1.0, 1.0].
/// Channel data sits behind an `Arc`, so cloning a `DecodedAudio` to hand a snapshot
/// to an export task never copies samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    channels: Arc<[Vec<f32>]>,
    sample_rate: SampleRate,
    frames: usize,
}

impl DecodedAudio {
    /// Create decoded audio from planar channel data
    ///
    /// # Errors
    /// Returns `InvalidInput` if there are no channels, the channels differ in length,
    /// or the sample rate is zero.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: SampleRate) -> Result<Self> {
        if channels.is_empty() {
            return Err(MasteringError::invalid_input("audio must have at least one channel"));
        }
        if sample_rate.as_hz() == 0 {
            return Err(MasteringError::invalid_input("sample rate must be non-zero"));
        }

        let frames = channels[0].len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != frames)
        {
            return Err(MasteringError::invalid_input(format!(
                "channel {} has {} samples, expected {}",
                index,
                channel.len(),
                frames
            )));
        }

        Ok(Self {
            channels: channels.into(),
            sample_rate,
            frames,
        })
    }

    /// Create decoded audio by de-interleaving `[L, R, L, R, ...]` style samples
    ///
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: SampleRate) -> Result<Self> {
        if channels == 0 {
            return Err(MasteringError::invalid_input("audio must have at least one channel"));
        }

        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (channel, &sample) in planar.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        Self::new(planar, sample_rate)
    }

    /// Create `frames` frames of silence
    pub fn silence(channels: usize, frames: usize, sample_rate: SampleRate) -> Result<Self> {
        Self::new(vec![vec![0.0; frames]; channels], sample_rate)
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Sample rate
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Samples of one channel
    ///
    /// # Panics
    /// Panics if `index >= channel_count()`
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Iterate over all channels in order
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / f64::from(self.sample_rate.as_hz())
    }

    /// Check whether the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Copy `frames` frames starting at `start` into `out` as interleaved samples
    /// with `out_channels` channels
    ///
    /// Mono sources are duplicated to every output channel; otherwise source channel
    /// `c` feeds output channel `c` and missing channels are left silent. Frames past
    /// the end of the buffer are written as silence. Returns the number of source
    /// frames actually copied.
    pub fn write_interleaved(&self, start: usize, out: &mut [f32], out_channels: usize) -> usize {
        if out_channels == 0 {
            return 0;
        }

        let frames = out.len() / out_channels;
        let available = self.frames.saturating_sub(start).min(frames);
        let source_channels = self.channel_count();

        for (i, frame) in out.chunks_exact_mut(out_channels).enumerate() {
            if i >= available {
                frame.fill(0.0);
                continue;
            }
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = if source_channels == 1 {
                    self.channels[0][start + i]
                } else if c < source_channels {
                    self.channels[c][start + i]
                } else {
                    0.0
                };
            }
        }

        available
    }
}
