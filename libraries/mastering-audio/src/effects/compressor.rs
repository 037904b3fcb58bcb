/// Dynamic Range Compressor
///
/// Reduces the dynamic range of audio by attenuating signals above a threshold.
/// The mastering chain runs it with one fixed, fairly heavy setting.
use super::chain::AudioEffect;

/// Compressor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Threshold in dB (-100 to 0)
    pub threshold_db: f32,

    /// Ratio (1.0 to 20.0)
    pub ratio: f32,

    /// Attack time in milliseconds (0 to 1000)
    pub attack_ms: f32,

    /// Release time in milliseconds (0 to 1000)
    pub release_ms: f32,

    /// Knee width in dB (0 to 40, 0 = hard knee)
    pub knee_db: f32,

    /// Makeup gain in dB (0 to 24)
    pub makeup_gain_db: f32,
}

impl CompressorSettings {
    /// The mastering chain's compressor
    /// - Threshold: -24 dB
    /// - Ratio: 12:1
    /// - Attack: 3 ms
    /// - Release: 250 ms
    /// - Soft knee: 30 dB
    /// - Makeup gain: 0 dB
    pub const fn mastering() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 12.0,
            attack_ms: 3.0,
            release_ms: 250.0,
            knee_db: 30.0,
            makeup_gain_db: 0.0,
        }
    }

    /// Validate and clamp settings to safe ranges
    pub fn validate(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-100.0, 0.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_ms = self.attack_ms.clamp(0.0, 1000.0);
        self.release_ms = self.release_ms.clamp(0.0, 1000.0);
        self.knee_db = self.knee_db.clamp(0.0, 40.0);
        self.makeup_gain_db = self.makeup_gain_db.clamp(0.0, 24.0);
    }
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self::mastering()
    }
}

/// Dynamic Range Compressor
///
/// Two-stage design:
/// 1. Peak level detection with instant attack and slow release (peak hold), so the
///    level does not wobble within a waveform cycle
/// 2. Gain smoothing with the configured attack/release
///
/// Detection is linked across all channels: the loudest channel drives one gain that
/// is applied to every channel, which keeps the stereo image.
pub struct Compressor {
    settings: CompressorSettings,

    // Peak level detector (dB)
    peak_level_db: f32,

    // Smoothed gain reduction (dB, <= 0)
    gain_reduction_db: f32,

    peak_release_coeff: f32,
    gr_attack_coeff: f32,
    gr_release_coeff: f32,
    makeup_gain_linear: f32,
}

const NOISE_FLOOR_DB: f32 = -120.0;

/// Peak hold release time (ms)
const PEAK_RELEASE_MS: f32 = 50.0;

impl Compressor {
    /// Create compressor with specific settings for a sample rate
    pub fn with_settings(mut settings: CompressorSettings, sample_rate: u32) -> Self {
        settings.validate();
        let sr = sample_rate.max(1) as f32;

        // coeff = exp(-1 / (time_ms * sample_rate / 1000)) gives 63% response at the given time
        let time_coeff = |ms: f32| {
            let samples = ms * sr / 1000.0;
            if samples <= 0.0 {
                0.0
            } else {
                (-1.0 / samples).exp()
            }
        };

        Self {
            settings,
            peak_level_db: NOISE_FLOOR_DB,
            gain_reduction_db: 0.0,
            peak_release_coeff: time_coeff(PEAK_RELEASE_MS),
            gr_attack_coeff: time_coeff(settings.attack_ms),
            gr_release_coeff: time_coeff(settings.release_ms),
            makeup_gain_linear: 10.0_f32.powf(settings.makeup_gain_db / 20.0),
        }
    }

    /// The fixed mastering compressor
    pub fn mastering(sample_rate: u32) -> Self {
        Self::with_settings(CompressorSettings::mastering(), sample_rate)
    }

    /// Get current settings
    pub fn settings(&self) -> CompressorSettings {
        self.settings
    }

    /// Current gain reduction in dB (0 = none)
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    /// Static curve: output level (dB) for an input level (dB)
    #[inline]
    fn compute_output_level(&self, input_db: f32) -> f32 {
        let threshold = self.settings.threshold_db;
        let ratio = self.settings.ratio;
        let knee = self.settings.knee_db;

        if knee <= 0.0 {
            if input_db <= threshold {
                input_db
            } else {
                threshold + (input_db - threshold) / ratio
            }
        } else {
            let half_knee = knee / 2.0;
            let knee_start = threshold - half_knee;
            let knee_end = threshold + half_knee;

            if input_db <= knee_start {
                input_db
            } else if input_db >= knee_end {
                threshold + (input_db - threshold) / ratio
            } else {
                // Quadratic transition through the knee
                let x = input_db - knee_start;
                let slope_change = (1.0 - 1.0 / ratio) / (2.0 * knee);
                input_db - slope_change * x * x
            }
        }
    }

    #[inline]
    fn compute_gain_reduction(&self, input_db: f32) -> f32 {
        self.compute_output_level(input_db) - input_db
    }

    #[inline]
    fn update_peak_level(&mut self, input_db: f32) {
        if input_db > self.peak_level_db {
            self.peak_level_db = input_db;
        } else {
            // Decay toward the noise floor, not the input: the input hits -inf at
            // every zero crossing.
            self.peak_level_db =
                self.peak_release_coeff * (self.peak_level_db - NOISE_FLOOR_DB) + NOISE_FLOOR_DB;
        }
    }

    #[inline]
    fn smooth_gain_reduction(&mut self, target_gr_db: f32) {
        let coeff = if target_gr_db < self.gain_reduction_db {
            self.gr_attack_coeff
        } else {
            self.gr_release_coeff
        };

        self.gain_reduction_db = coeff * self.gain_reduction_db + (1.0 - coeff) * target_gr_db;
    }
}

impl AudioEffect for Compressor {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        for frame in buffer.chunks_exact_mut(channels) {
            let max_sample = frame.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));

            let input_db = if max_sample > 1e-10 {
                20.0 * max_sample.log10()
            } else {
                -200.0
            };

            self.update_peak_level(input_db);
            let target_gr_db = self.compute_gain_reduction(self.peak_level_db);
            self.smooth_gain_reduction(target_gr_db);

            let gain = 10.0_f32.powf(self.gain_reduction_db / 20.0) * self.makeup_gain_linear;
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {
        self.peak_level_db = NOISE_FLOOR_DB;
        self.gain_reduction_db = 0.0;
    }

    fn name(&self) -> &str {
        "Compressor"
    }
}
