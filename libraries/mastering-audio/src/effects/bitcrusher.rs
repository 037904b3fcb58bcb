//! Bitcrusher
//!
//! Quantizes to `2^-bit_depth` steps and holds each quantized value for
//! `frequency_reduction` samples. The block step is a pure function of
//! `(state, settings, input)` so it can be reasoned about and tested without a chain;
//! [`BitcrusherProcessor`] wraps it as a stage and owns the state on the render thread.

use super::chain::AudioEffect;
use mastering_core::BitcrusherSettings;

/// Slack for phase comparisons; `N` additions of `1/N` may land a hair under 1.0
const PHASE_EPSILON: f64 = 1e-9;

/// State carried from one block to the next
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BitcrusherState {
    /// Phase accumulator in [0, 1)
    pub phase: f64,
    /// Last quantized sample, output until the next capture
    pub held: f32,
}

/// Quantize `x` to the nearest multiple of `2^-bit_depth`
#[inline]
pub fn quantize(x: f32, bit_depth: u32) -> f32 {
    let step = 0.5_f64.powi(bit_depth.clamp(1, 16) as i32);
    (step * (f64::from(x) / step + 0.5).floor()) as f32
}

/// Advance one sample
#[inline]
fn step(state: &mut BitcrusherState, increment: f64, bit_depth: u32, x: f32) -> f32 {
    state.phase += increment;
    if state.phase + PHASE_EPSILON >= 1.0 {
        let rest = state.phase - 1.0;
        state.phase = if rest < PHASE_EPSILON { 0.0 } else { rest };
        state.held = quantize(x, bit_depth);
    }
    state.held
}

fn increment(settings: &BitcrusherSettings) -> f64 {
    1.0 / f64::from(settings.frequency_reduction.max(1))
}

/// Crush `input` into `output` starting from `state`, returning the state after the block
///
/// `output` must be at least as long as `input`; extra output samples are untouched.
pub fn crush_into(
    state: BitcrusherState,
    settings: &BitcrusherSettings,
    input: &[f32],
    output: &mut [f32],
) -> BitcrusherState {
    let mut state = state;
    let inc = increment(settings);
    for (out, &x) in output.iter_mut().zip(input) {
        *out = step(&mut state, inc, settings.bit_depth, x);
    }
    state
}

/// Crush one block: `(state, settings, input) -> (new state, output)`
pub fn process_block(
    state: BitcrusherState,
    settings: &BitcrusherSettings,
    input: &[f32],
) -> (BitcrusherState, Vec<f32>) {
    let mut output = vec![0.0; input.len()];
    let state = crush_into(state, settings, input, &mut output);
    (state, output)
}

/// Bitcrusher stage
///
/// Works on a single channel: every frame is averaged to mono, crushed, and written
/// back to all channels.
pub struct BitcrusherProcessor {
    settings: BitcrusherSettings,
    state: BitcrusherState,
}

impl BitcrusherProcessor {
    /// Create a processor with fresh state
    pub fn new(mut settings: BitcrusherSettings) -> Self {
        settings.validate();
        Self {
            settings,
            state: BitcrusherState::default(),
        }
    }

    /// Settings this processor was built with
    pub fn settings(&self) -> BitcrusherSettings {
        self.settings
    }

    /// Current carried state
    pub fn state(&self) -> BitcrusherState {
        self.state
    }
}

impl AudioEffect for BitcrusherProcessor {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        let inc = increment(&self.settings);
        let scale = 1.0 / channels as f32;
        for frame in buffer.chunks_exact_mut(channels) {
            let mono = if channels == 1 {
                frame[0]
            } else {
                frame.iter().sum::<f32>() * scale
            };
            let out = step(&mut self.state, inc, self.settings.bit_depth, mono);
            frame.fill(out);
        }
    }

    fn reset(&mut self) {
        self.state = BitcrusherState::default();
    }

    fn name(&self) -> &str {
        "Bitcrusher"
    }
}
