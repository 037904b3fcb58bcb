//! Audio effects processing
//!
//! Trait-based stages for the mastering chain. Every stage processes interleaved f32
//! blocks in place and keeps its own state between blocks.
//!
//! Available stages, in chain order:
//! - **EqStage**: one band of the 5-band equalizer (shelf or peaking biquad)
//! - **Compressor**: fixed-setting mastering compressor
//! - **ConvolutionReverb**: FFT overlap-add convolution with a synthetic impulse response
//! - **BitcrusherProcessor**: quantization plus sample-and-hold decimation
//! - **GainStage**: master volume

mod bitcrusher;
mod chain;
mod compressor;
mod convolution;
mod eq;
mod gain;

pub use bitcrusher::{crush_into, process_block, quantize, BitcrusherProcessor, BitcrusherState};
pub use chain::{AudioEffect, EffectChain};
pub use compressor::{Compressor, CompressorSettings};
pub use convolution::{normalization_scale, ConvolutionReverb};
pub use eq::{EqStage, EQ_Q};
pub use gain::GainStage;

