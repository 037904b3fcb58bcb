//! Processing contexts and shared parameters
//!
//! A [`ProcessingContext`] is what stages are built against: it fixes the sample rate,
//! channel count and block size, and carries the lifecycle state shared between the
//! controlling thread and the render thread. [`AudioParam`] is the lock-free scalar the
//! controller uses to poke live stages without rebuilding them.

use crate::error::{AudioError, Result};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// Block size used by the real-time render thread (frames)
pub const REALTIME_QUANTUM: usize = 4096;

/// Block size used by offline rendering (frames)
pub const OFFLINE_QUANTUM: usize = 65536;

/// Channel count of the real-time output
pub const REALTIME_CHANNELS: u16 = 2;

/// Lifecycle state of a processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No context exists yet
    Uninitialized,
    /// Created but not rendering (initial state of a real-time context)
    Suspended,
    /// Rendering blocks
    Running,
    /// Torn down; nothing can be built against it anymore
    Closed,
}

impl ContextState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Suspended,
            2 => Self::Running,
            3 => Self::Closed,
            _ => Self::Uninitialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Suspended => 1,
            Self::Running => 2,
            Self::Closed => 3,
        }
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Suspended => "suspended",
            Self::Running => "running",
            Self::Closed => "closed",
        })
    }
}

/// Whether a context renders in real time or as fast as possible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Live playback, paced by the output device
    Realtime,
    /// Export rendering of exactly `frames` frames
    Offline { frames: usize },
}

#[derive(Debug)]
struct ContextInner {
    kind: ContextKind,
    sample_rate: u32,
    channels: u16,
    quantum: usize,
    state: AtomicU8,
}

/// Handle to a processing context
///
/// Cloning yields another handle to the same context; closing through any handle
/// closes it for all of them.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    inner: Arc<ContextInner>,
}

impl ProcessingContext {
    /// Create a real-time stereo context
    ///
    /// Starts suspended; it only renders after [`resume`](Self::resume).
    pub fn realtime(sample_rate: u32) -> Self {
        Self::with_kind(
            ContextKind::Realtime,
            sample_rate,
            REALTIME_CHANNELS,
            REALTIME_QUANTUM,
            ContextState::Suspended,
        )
    }

    /// Create an offline context sized to a source buffer
    ///
    /// Offline contexts are running from the start.
    pub fn offline(channels: u16, frames: usize, sample_rate: u32) -> Self {
        Self::with_kind(
            ContextKind::Offline { frames },
            sample_rate,
            channels,
            OFFLINE_QUANTUM,
            ContextState::Running,
        )
    }

    fn with_kind(
        kind: ContextKind,
        sample_rate: u32,
        channels: u16,
        quantum: usize,
        state: ContextState,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                kind,
                sample_rate,
                channels,
                quantum,
                state: AtomicU8::new(state.as_u8()),
            }),
        }
    }

    /// Context kind
    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    /// Number of output channels
    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    /// Render block size in frames
    pub fn quantum(&self) -> usize {
        self.inner.quantum
    }

    /// Largest block the context hands to a stage in one call
    ///
    /// Offline contexts never render more than the source length at once.
    pub fn max_block(&self) -> usize {
        match self.inner.kind {
            ContextKind::Offline { frames } => self.inner.quantum.min(frames.max(1)),
            ContextKind::Realtime => self.inner.quantum,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Check if the context has been closed
    pub fn is_closed(&self) -> bool {
        self.state() == ContextState::Closed
    }

    /// Fail with `ContextClosed` if the context is closed
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(AudioError::ContextClosed)
        } else {
            Ok(())
        }
    }

    /// Start rendering
    ///
    /// Resuming a running context is a no-op.
    pub fn resume(&self) -> Result<()> {
        self.transition(ContextState::Running)
    }

    /// Stop rendering without tearing anything down
    pub fn suspend(&self) -> Result<()> {
        self.transition(ContextState::Suspended)
    }

    /// Close the context
    ///
    /// Closing is idempotent and cannot be undone.
    pub fn close(&self) {
        self.inner
            .state
            .store(ContextState::Closed.as_u8(), Ordering::Release);
    }

    fn transition(&self, target: ContextState) -> Result<()> {
        self.inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ContextState::Closed.as_u8()).then_some(target.as_u8())
            })
            .map(|_| ())
            .map_err(|_| AudioError::ContextClosed)
    }
}

/// Lock-free scalar parameter shared between the controller and a live stage
///
/// Stores an `f32` as raw bits in an atomic; writes are visible to the render thread
/// at its next block.
#[derive(Debug, Clone)]
pub struct AudioParam {
    bits: Arc<AtomicU32>,
}

impl AudioParam {
    /// Create a parameter with an initial value
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    /// Read the current value
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Write a new value
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_context_starts_suspended_stereo() {
        let ctx = ProcessingContext::realtime(48_000);
        assert_eq!(ctx.state(), ContextState::Suspended);
        assert_eq!(ctx.channels(), 2);
        assert_eq!(ctx.sample_rate(), 48_000);
        assert_eq!(ctx.quantum(), REALTIME_QUANTUM);
        assert_eq!(ctx.kind(), ContextKind::Realtime);
    }

    #[test]
    fn offline_context_is_sized_to_source() {
        let ctx = ProcessingContext::offline(1, 1234, 22_050);
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(ctx.channels(), 1);
        assert_eq!(ctx.kind(), ContextKind::Offline { frames: 1234 });
        assert_eq!(ctx.max_block(), 1234);
        assert_eq!(ProcessingContext::offline(2, 1 << 20, 44_100).max_block(), OFFLINE_QUANTUM);
    }

    #[test]
    fn resume_and_suspend() {
        let ctx = ProcessingContext::realtime(44_100);
        ctx.resume().unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        ctx.resume().unwrap();
        ctx.suspend().unwrap();
        assert_eq!(ctx.state(), ContextState::Suspended);
    }

    #[test]
    fn closed_context_stays_closed() {
        let ctx = ProcessingContext::realtime(44_100);
        let other = ctx.clone();
        ctx.close();
        ctx.close();

        assert!(other.is_closed());
        assert!(matches!(other.resume(), Err(AudioError::ContextClosed)));
        assert!(matches!(other.ensure_open(), Err(AudioError::ContextClosed)));
        assert_eq!(other.state(), ContextState::Closed);
    }

    #[test]
    fn param_is_shared_between_clones() {
        let param = AudioParam::new(1.0);
        let live = param.clone();
        param.set(0.25);
        assert_eq!(live.get(), 0.25);
    }

    #[test]
    fn state_display() {
        assert_eq!(ContextState::Running.to_string(), "running");
        assert_eq!(ContextState::Uninitialized.to_string(), "uninitialized");
    }
}
