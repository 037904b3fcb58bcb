/// Equalizer band stage
///
/// One biquad per band (low shelf, peaking or high shelf), shared across channels with
/// per-channel history. The band gain comes from an [`AudioParam`] so the controller can
/// move it while the stage runs on the render thread.
use super::chain::AudioEffect;
use crate::context::AudioParam;
use mastering_core::{EqBand, EqFilterShape};

/// Q used by every band. For shelves this is the shelf slope, so Q = 1 is the
/// steepest slope without overshoot.
pub const EQ_Q: f32 = 1.0;

/// Exponential smoothing rate for coefficient changes (~10 ms at 44.1 kHz)
const SMOOTH_COEFF: f32 = 0.002;

/// Active coefficients snap to the target once every delta is below this
const SNAP_EPSILON: f32 = 1e-7;

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Coefficients for one band shape
    ///
    /// The frequency is clamped to 45% of the sample rate to stay clear of Nyquist.
    fn design(shape: EqFilterShape, sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }

        let a = 10.0_f32.powf(gain_db / 40.0);
        let clamped_freq = frequency.min(sample_rate * 0.45);
        let omega = 2.0 * std::f32::consts::PI * clamped_freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();

        let (b0, b1, b2, a0, a1, a2) = match shape {
            EqFilterShape::Peaking => {
                let alpha = sin_omega / (2.0 * q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_omega,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_omega,
                    1.0 - alpha / a,
                )
            }
            EqFilterShape::LowShelf => {
                let alpha = sin_omega / 2.0 * ((a + 1.0 / a) * (1.0 / q - 1.0) + 2.0).sqrt();
                let beta = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + beta),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - beta),
                    (a + 1.0) + (a - 1.0) * cos_omega + beta,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - beta,
                )
            }
            EqFilterShape::HighShelf => {
                let alpha = sin_omega / 2.0 * ((a + 1.0 / a) * (1.0 / q - 1.0) + 2.0).sqrt();
                let beta = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_omega + beta),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                    a * ((a + 1.0) + (a - 1.0) * cos_omega - beta),
                    (a + 1.0) - (a - 1.0) * cos_omega + beta,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                    (a + 1.0) - (a - 1.0) * cos_omega - beta,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Numerator equals denominator: the filter passes input through unchanged.
    ///
    /// Every shape designs to this exactly at 0 dB.
    fn is_identity(&self) -> bool {
        self.b0 == 1.0 && self.b1 == self.a1 && self.b2 == self.a2
    }
}

/// Per-channel filter history
#[derive(Debug, Clone, Copy, Default)]
struct History {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// Biquad filter with coefficient smoothing
///
/// Coefficients glide toward their target so live gain changes don't click.
#[derive(Debug, Clone)]
struct BiquadFilter {
    target: Coefficients,
    active: Coefficients,
    history: Vec<History>,
}

impl BiquadFilter {
    fn new(channels: usize) -> Self {
        Self {
            target: Coefficients::IDENTITY,
            active: Coefficients::IDENTITY,
            history: vec![History::default(); channels.max(1)],
        }
    }

    fn set_target(&mut self, target: Coefficients) {
        self.target = target;
    }

    fn is_settled(&self) -> bool {
        self.active == self.target
    }

    #[inline]
    fn smooth_coefficients(&mut self) {
        if self.is_settled() {
            return;
        }

        let t = self.target;
        let c = &mut self.active;
        c.b0 += SMOOTH_COEFF * (t.b0 - c.b0);
        c.b1 += SMOOTH_COEFF * (t.b1 - c.b1);
        c.b2 += SMOOTH_COEFF * (t.b2 - c.b2);
        c.a1 += SMOOTH_COEFF * (t.a1 - c.a1);
        c.a2 += SMOOTH_COEFF * (t.a2 - c.a2);

        let max_delta = (t.b0 - c.b0)
            .abs()
            .max((t.b1 - c.b1).abs())
            .max((t.b2 - c.b2).abs())
            .max((t.a1 - c.a1).abs())
            .max((t.a2 - c.a2).abs());
        if max_delta < SNAP_EPSILON {
            *c = t;
        }
    }

    #[inline]
    fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let c = self.active;
        let h = &mut self.history[channel];

        let mut out = c.b0 * input + c.b1 * h.x1 + c.b2 * h.x2 - c.a1 * h.y1 - c.a2 * h.y2;

        // Flush denormals
        if out.abs() < 1e-15 {
            out = 0.0;
        }

        h.x2 = h.x1;
        h.x1 = input;
        h.y2 = h.y1;
        h.y1 = out;

        out
    }

    /// Track history for an identity filter without touching the samples
    fn pass_through(&mut self, buffer: &[f32], channels: usize) {
        let frames = buffer.len() / channels;
        for (channel, h) in self.history.iter_mut().enumerate().take(channels) {
            if frames >= 1 {
                let last = buffer[(frames - 1) * channels + channel];
                let previous = if frames >= 2 {
                    buffer[(frames - 2) * channels + channel]
                } else {
                    h.x1
                };
                h.x2 = previous;
                h.y2 = previous;
                h.x1 = last;
                h.y1 = last;
            }
        }
    }

    fn ensure_channels(&mut self, channels: usize) {
        if self.history.len() < channels {
            self.history.resize(channels, History::default());
        }
    }

    /// Clear history and snap to the target coefficients
    fn reset(&mut self) {
        self.history.fill(History::default());
        self.active = self.target;
    }
}

/// One EQ band as a chain stage
pub struct EqStage {
    band: EqBand,
    sample_rate: f32,
    gain: AudioParam,
    applied_gain_db: f32,
    filter: BiquadFilter,
}

impl EqStage {
    /// Build a band stage for a context
    ///
    /// The filter starts settled at the current gain, so the first rendered block is
    /// already fully equalized.
    pub fn new(band: EqBand, gain: AudioParam, sample_rate: u32, channels: usize) -> Self {
        let applied_gain_db = gain.get();
        let mut filter = BiquadFilter::new(channels);
        let sample_rate = sample_rate as f32;
        filter.set_target(Coefficients::design(
            band.shape(),
            sample_rate,
            band.frequency_hz(),
            EQ_Q,
            applied_gain_db,
        ));
        filter.reset();

        Self {
            band,
            sample_rate,
            gain,
            applied_gain_db,
            filter,
        }
    }

    /// Band this stage implements
    pub fn band(&self) -> EqBand {
        self.band
    }

    /// Gain currently applied (dB)
    pub fn gain_db(&self) -> f32 {
        self.applied_gain_db
    }

    fn follow_gain(&mut self) {
        let gain_db = self.gain.get();
        if gain_db != self.applied_gain_db {
            self.applied_gain_db = gain_db;
            self.filter.set_target(Coefficients::design(
                self.band.shape(),
                self.sample_rate,
                self.band.frequency_hz(),
                EQ_Q,
                gain_db,
            ));
        }
    }
}

impl AudioEffect for EqStage {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        self.follow_gain();
        self.filter.ensure_channels(channels);

        if self.filter.is_settled() && self.filter.active.is_identity() {
            self.filter.pass_through(buffer, channels);
            return;
        }

        for frame in buffer.chunks_exact_mut(channels) {
            self.filter.smooth_coefficients();
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = self.filter.process_sample(channel, *sample);
            }
        }
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn name(&self) -> &str {
        self.band.label()
    }
}
