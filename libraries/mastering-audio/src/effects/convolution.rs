//! Convolution reverb
//!
//! FFT overlap-add convolution with zero latency: every call convolves the incoming
//! block with the whole impulse response, writes the first `block` samples of the
//! accumulated result and keeps the remainder as tail for the next call.
//!
//! The FFT size is chosen once from the impulse response length and the largest block
//! the context will hand in, so a render quantum never needs more than one transform
//! pair per channel.
//!
//! # Example
//!
//! ```rust
//! use mastering_audio::effects::{AudioEffect, ConvolutionReverb};
//! use mastering_audio::ImpulseResponse;
//!
//! let ir = ImpulseResponse::new(vec![vec![1.0, 0.5], vec![1.0, 0.5]], 44_100).unwrap();
//! let mut reverb = ConvolutionReverb::new(&ir, 2, 256, false).unwrap();
//!
//! let mut buffer = vec![0.5; 512];
//! reverb.process(&mut buffer, 2);
//! ```

use super::AudioEffect;
use crate::error::{AudioError, Result};
use crate::impulse::ImpulseResponse;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Loudness calibration applied to normalized impulse responses (about -58 dB)
const GAIN_CALIBRATION: f64 = 0.00125;

/// Reference rate the calibration was measured at
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44_100.0;

/// Power floor so near-silent responses don't explode
const MIN_POWER: f64 = 0.000_125;

/// Scale that brings an impulse response to a consistent perceived loudness
///
/// Uses the RMS over every channel, inverted and calibrated, then corrected for the
/// response's sample rate.
pub fn normalization_scale(ir: &ImpulseResponse) -> f32 {
    let samples = ir.frames() * ir.channel_count();
    let energy: f64 = ir
        .channels()
        .flat_map(|channel| channel.iter())
        .map(|&s| f64::from(s) * f64::from(s))
        .sum();

    let mut power = if samples == 0 {
        0.0
    } else {
        (energy / samples as f64).sqrt()
    };
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    if ir.sample_rate() > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / f64::from(ir.sample_rate());
    }
    scale as f32
}

/// Convolution reverb stage
///
/// Output channel `c` is convolved with impulse response channel `c % ir_channels`;
/// a mono output uses the average of a stereo response's two channels.
pub struct ConvolutionReverb {
    fft_size: usize,
    ir_frames: usize,
    /// Largest number of frames convolved per transform (fft_size - ir_frames + 1)
    block_size: usize,
    /// Pre-computed, pre-scaled spectrum per output channel
    kernels: Vec<Vec<Complex<f32>>>,
    /// Accumulated convolution output per channel; index 0 is the next sample out
    overlap: Vec<Vec<f32>>,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
}

impl ConvolutionReverb {
    /// Prepare a reverb for `channels` output channels and blocks of up to `max_block` frames
    ///
    /// # Errors
    /// Returns an error if the impulse response is empty or `channels` is zero
    pub fn new(ir: &ImpulseResponse, channels: usize, max_block: usize, normalize: bool) -> Result<Self> {
        if ir.frames() == 0 {
            return Err(AudioError::stage("reverb", "impulse response is empty"));
        }
        if channels == 0 {
            return Err(AudioError::stage("reverb", "no output channels"));
        }

        let ir_frames = ir.frames();
        let fft_size = (ir_frames + max_block.max(1) - 1).next_power_of_two();
        let block_size = fft_size - ir_frames + 1;

        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(fft_size);
        let fft_inverse = planner.plan_fft_inverse(fft_size);

        // Fold the inverse transform's 1/N into the kernel
        let gain = if normalize { normalization_scale(ir) } else { 1.0 };
        let scale = gain / fft_size as f32;

        let kernels = (0..channels)
            .map(|channel| {
                let mut kernel = vec![Complex::new(0.0, 0.0); fft_size];
                if channels == 1 && ir.channel_count() >= 2 {
                    for (slot, (l, r)) in kernel.iter_mut().zip(ir.channel(0).iter().zip(ir.channel(1))) {
                        *slot = Complex::new((l + r) * 0.5 * scale, 0.0);
                    }
                } else {
                    let source = ir.channel(channel % ir.channel_count());
                    for (slot, &s) in kernel.iter_mut().zip(source) {
                        *slot = Complex::new(s * scale, 0.0);
                    }
                }
                fft_forward.process(&mut kernel);
                kernel
            })
            .collect();

        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());

        Ok(Self {
            fft_size,
            ir_frames,
            block_size,
            kernels,
            overlap: vec![vec![0.0; fft_size]; channels],
            fft_forward,
            fft_inverse,
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    /// Impulse response length in frames
    pub fn ir_length(&self) -> usize {
        self.ir_frames
    }

    /// FFT size used per transform
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn convolve_chunk(&mut self, buffer: &mut [f32], channels: usize, start: usize, len: usize) {
        let conv_len = len + self.ir_frames - 1;

        for channel in 0..channels.min(self.kernels.len()) {
            for (i, slot) in self.spectrum.iter_mut().enumerate() {
                *slot = if i < len {
                    Complex::new(buffer[(start + i) * channels + channel], 0.0)
                } else {
                    Complex::new(0.0, 0.0)
                };
            }

            self.fft_forward
                .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);
            for (bin, k) in self.spectrum.iter_mut().zip(&self.kernels[channel]) {
                *bin *= *k;
            }
            self.fft_inverse
                .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

            let overlap = &mut self.overlap[channel];
            for (acc, bin) in overlap.iter_mut().zip(&self.spectrum).take(conv_len) {
                *acc += bin.re;
            }

            for i in 0..len {
                buffer[(start + i) * channels + channel] = overlap[i];
            }

            overlap.copy_within(len.., 0);
            let tail_start = self.fft_size - len;
            overlap[tail_start..].fill(0.0);
        }
    }
}

impl AudioEffect for ConvolutionReverb {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 || buffer.is_empty() {
            return;
        }

        let frames = buffer.len() / channels;
        let mut start = 0;
        while start < frames {
            let len = (frames - start).min(self.block_size);
            self.convolve_chunk(buffer, channels, start, len);
            start += len;
        }
    }

    fn reset(&mut self) {
        for overlap in &mut self.overlap {
            overlap.fill(0.0);
        }
    }

    fn name(&self) -> &str {
        "Convolution Reverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ir(channels: Vec<Vec<f32>>) -> ImpulseResponse {
        ImpulseResponse::new(channels, 44_100).unwrap()
    }

    /// Direct-form reference convolution of one channel
    fn convolve(input: &[f32], kernel: &[f32]) -> Vec<f32> {
        (0..input.len())
            .map(|n| {
                kernel
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k <= n)
                    .map(|(k, h)| h * input[n - k])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn dirac_passes_signal_through() {
        let mut reverb = ConvolutionReverb::new(&ir(vec![vec![1.0], vec![1.0]]), 2, 64, false).unwrap();

        let mut buffer = vec![0.5, 0.5, 0.3, 0.3, -0.2, -0.2, 0.0, 0.0];
        let original = buffer.clone();
        reverb.process(&mut buffer, 2);

        for (out, inp) in buffer.iter().zip(&original) {
            assert!((out - inp).abs() < 1e-5, "Expected ~{inp}, got {out}");
        }
    }

    #[test]
    fn matches_direct_convolution_across_blocks() {
        let kernel: Vec<f32> = (0..100).map(|i| 0.9_f32.powi(i) * if i % 3 == 0 { 1.0 } else { -0.5 }).collect();
        let input: Vec<f32> = (0..1000).map(|i| ((i * 7919) % 200) as f32 / 100.0 - 1.0).collect();
        let expected = convolve(&input, &kernel);

        // Mono output, mono IR, small blocks so the tail carries across calls
        let mut reverb = ConvolutionReverb::new(&ir(vec![kernel]), 1, 37, false).unwrap();
        let mut output = Vec::new();
        for block in input.chunks(37) {
            let mut block = block.to_vec();
            reverb.process(&mut block, 1);
            output.extend(block);
        }

        for (i, (out, exp)) in output.iter().zip(&expected).enumerate() {
            assert!((out - exp).abs() < 1e-3, "sample {i}: expected {exp}, got {out}");
        }
    }

    #[test]
    fn oversized_block_is_split() {
        let kernel = vec![0.5, 0.25, 0.125];
        let input: Vec<f32> = (0..500).map(|i| (i as f32 * 0.1).sin()).collect();
        let expected = convolve(&input, &kernel);

        let mut reverb = ConvolutionReverb::new(&ir(vec![kernel]), 1, 16, false).unwrap();
        let mut output = input.clone();
        reverb.process(&mut output, 1);

        for (out, exp) in output.iter().zip(&expected) {
            assert!((out - exp).abs() < 1e-4);
        }
    }

    #[test]
    fn mono_output_averages_stereo_response() {
        let mut reverb = ConvolutionReverb::new(&ir(vec![vec![1.0], vec![0.0]]), 1, 8, false).unwrap();
        let mut buffer = vec![1.0, 0.0, 0.0, 0.0];
        reverb.process(&mut buffer, 1);
        assert!((buffer[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn tail_rings_after_input_stops() {
        let mut reverb = ConvolutionReverb::new(&ir(vec![vec![0.0, 0.0, 0.0, 1.0]]), 1, 4, false).unwrap();

        let mut first = vec![1.0, 0.0];
        reverb.process(&mut first, 1);
        assert!(first.iter().all(|s| s.abs() < 1e-6));

        let mut second = vec![0.0, 0.0];
        reverb.process(&mut second, 1);
        assert!((second[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn reset_drops_tail() {
        let mut reverb = ConvolutionReverb::new(&ir(vec![vec![0.0, 0.0, 1.0]]), 1, 4, false).unwrap();
        let mut buffer = vec![1.0];
        reverb.process(&mut buffer, 1);

        reverb.reset();

        let mut silence = vec![0.0; 4];
        reverb.process(&mut silence, 1);
        assert!(silence.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn normalization_is_calibrated() {
        // Constant response with RMS 0.5 at the reference rate
        let response = ir(vec![vec![0.5; 64], vec![-0.5; 64]]);
        let scale = normalization_scale(&response);
        assert!((scale - 0.0025).abs() < 1e-7);

        let silent = ir(vec![vec![0.0; 64]]);
        assert!((normalization_scale(&silent) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn empty_response_is_rejected() {
        let empty = ImpulseResponse::new(vec![Vec::new()], 44_100).unwrap();
        let result = ConvolutionReverb::new(&empty, 2, 64, true);
        assert!(matches!(result, Err(AudioError::StageConstruction { stage: "reverb", .. })));
    }
}
