//! Mastering settings
//!
//! Everything the user can change about the processing chain. These values persist
//! across file loads and playback sessions; only the user changes them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest EQ gain accepted by the settings surface (dB)
pub const EQ_GAIN_MIN_DB: f64 = -30.0;
/// Highest EQ gain accepted by the settings surface (dB)
pub const EQ_GAIN_MAX_DB: f64 = 30.0;

/// Lowest supported bitcrusher bit depth
pub const BIT_DEPTH_MIN: u32 = 1;
/// Highest supported bitcrusher bit depth
pub const BIT_DEPTH_MAX: u32 = 16;
/// Highest frequency reduction offered by the settings surface
pub const FREQUENCY_REDUCTION_MAX: u32 = 20;

/// Lowest master volume (silence)
pub const VOLUME_MIN: f64 = 0.0;
/// Highest master volume (+6 dB)
pub const VOLUME_MAX: f64 = 2.0;

/// Filter shape used by an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqFilterShape {
    /// Boosts/cuts everything below the corner frequency
    LowShelf,
    /// Boosts/cuts around the center frequency
    Peaking,
    /// Boosts/cuts everything above the corner frequency
    HighShelf,
}

/// One of the five fixed equalizer bands, ordered low to high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqBand {
    Bass,
    LowMid,
    Mid,
    HighMid,
    Treble,
}

impl EqBand {
    /// All bands in chain order
    pub const ALL: [EqBand; 5] = [
        EqBand::Bass,
        EqBand::LowMid,
        EqBand::Mid,
        EqBand::HighMid,
        EqBand::Treble,
    ];

    /// Position of the band in the chain (0 = bass)
    pub fn index(self) -> usize {
        match self {
            EqBand::Bass => 0,
            EqBand::LowMid => 1,
            EqBand::Mid => 2,
            EqBand::HighMid => 3,
            EqBand::Treble => 4,
        }
    }

    /// Center (or corner) frequency in Hz
    pub fn frequency_hz(self) -> f32 {
        match self {
            EqBand::Bass => 60.0,
            EqBand::LowMid => 250.0,
            EqBand::Mid => 1000.0,
            EqBand::HighMid => 4000.0,
            EqBand::Treble => 10000.0,
        }
    }

    /// Filter shape for this band
    pub fn shape(self) -> EqFilterShape {
        match self {
            EqBand::Bass => EqFilterShape::LowShelf,
            EqBand::Treble => EqFilterShape::HighShelf,
            EqBand::LowMid | EqBand::Mid | EqBand::HighMid => EqFilterShape::Peaking,
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            EqBand::Bass => "Bass",
            EqBand::LowMid => "Low Mid",
            EqBand::Mid => "Mid",
            EqBand::HighMid => "High Mid",
            EqBand::Treble => "Treble",
        }
    }
}

impl fmt::Display for EqBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Five-band equalizer gains in dB
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EqSettings {
    pub bass: f64,
    pub low_mid: f64,
    pub mid: f64,
    pub high_mid: f64,
    pub treble: f64,
}

impl EqSettings {
    /// Gain of a band in dB
    pub fn gain_db(&self, band: EqBand) -> f64 {
        match band {
            EqBand::Bass => self.bass,
            EqBand::LowMid => self.low_mid,
            EqBand::Mid => self.mid,
            EqBand::HighMid => self.high_mid,
            EqBand::Treble => self.treble,
        }
    }

    /// Set the gain of a band (clamped to ±30 dB)
    pub fn set_gain_db(&mut self, band: EqBand, gain_db: f64) {
        let gain_db = clamp_finite(gain_db, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB, 0.0);
        match band {
            EqBand::Bass => self.bass = gain_db,
            EqBand::LowMid => self.low_mid = gain_db,
            EqBand::Mid => self.mid = gain_db,
            EqBand::HighMid => self.high_mid = gain_db,
            EqBand::Treble => self.treble = gain_db,
        }
    }

    /// Gains in chain order
    pub fn gains(&self) -> [f64; 5] {
        EqBand::ALL.map(|band| self.gain_db(band))
    }

    /// Check if every band is at 0 dB
    pub fn is_flat(&self) -> bool {
        self.gains().iter().all(|&gain| gain == 0.0)
    }

    /// Clamp all gains to the supported range
    pub fn validate(&mut self) {
        for band in EqBand::ALL {
            self.set_gain_db(band, self.gain_db(band));
        }
    }
}

/// Switchable effects, listed in chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Compressor,
    Reverb,
    Bitcrusher,
}

impl Effect {
    /// All effects in chain order
    pub const ALL: [Effect; 3] = [Effect::Compressor, Effect::Reverb, Effect::Bitcrusher];

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            Effect::Compressor => "Compressor",
            Effect::Reverb => "Reverb",
            Effect::Bitcrusher => "Bitcrusher",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which optional effects are present in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsEnabled {
    pub compressor: bool,
    pub reverb: bool,
    pub bitcrusher: bool,
}

impl EffectsEnabled {
    /// Check whether an effect is enabled
    pub fn is_enabled(&self, effect: Effect) -> bool {
        match effect {
            Effect::Compressor => self.compressor,
            Effect::Reverb => self.reverb,
            Effect::Bitcrusher => self.bitcrusher,
        }
    }

    /// Enable or disable an effect
    pub fn set_enabled(&mut self, effect: Effect, enabled: bool) {
        match effect {
            Effect::Compressor => self.compressor = enabled,
            Effect::Reverb => self.reverb = enabled,
            Effect::Bitcrusher => self.bitcrusher = enabled,
        }
    }

    /// Flip an effect and return its new state
    pub fn toggle(&mut self, effect: Effect) -> bool {
        let enabled = !self.is_enabled(effect);
        self.set_enabled(effect, enabled);
        enabled
    }

    /// All eight flag combinations
    pub fn all_combinations() -> impl Iterator<Item = EffectsEnabled> {
        (0u8..8).map(|bits| EffectsEnabled {
            compressor: bits & 0b001 != 0,
            reverb: bits & 0b010 != 0,
            bitcrusher: bits & 0b100 != 0,
        })
    }
}

/// Bitcrusher parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcrusherSettings {
    /// Quantization depth in bits (1 to 16)
    pub bit_depth: u32,
    /// Sample-and-hold factor (1 = no downsampling)
    pub frequency_reduction: u32,
}

impl BitcrusherSettings {
    /// Create settings, clamping both values to their supported ranges
    pub fn new(bit_depth: u32, frequency_reduction: u32) -> Self {
        let mut settings = Self {
            bit_depth,
            frequency_reduction,
        };
        settings.validate();
        settings
    }

    /// Clamp bit depth to 1..=16 and frequency reduction to 1..=20
    pub fn validate(&mut self) {
        self.bit_depth = self.bit_depth.clamp(BIT_DEPTH_MIN, BIT_DEPTH_MAX);
        self.frequency_reduction = self.frequency_reduction.clamp(1, FREQUENCY_REDUCTION_MAX);
    }

    /// Apply a partial update, returning whether anything changed
    pub fn apply(&mut self, update: BitcrusherUpdate) -> bool {
        let before = *self;
        if let Some(bit_depth) = update.bit_depth {
            self.bit_depth = bit_depth;
        }
        if let Some(frequency_reduction) = update.frequency_reduction {
            self.frequency_reduction = frequency_reduction;
        }
        self.validate();
        before != *self
    }
}

impl Default for BitcrusherSettings {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            frequency_reduction: 4,
        }
    }
}

/// Partial bitcrusher update; `None` leaves a value unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitcrusherUpdate {
    pub bit_depth: Option<u32>,
    pub frequency_reduction: Option<u32>,
}

impl BitcrusherUpdate {
    /// Update only the bit depth
    pub fn bit_depth(bit_depth: u32) -> Self {
        Self {
            bit_depth: Some(bit_depth),
            frequency_reduction: None,
        }
    }

    /// Update only the frequency reduction
    pub fn frequency_reduction(frequency_reduction: u32) -> Self {
        Self {
            bit_depth: None,
            frequency_reduction: Some(frequency_reduction),
        }
    }
}

/// Master output gain (linear, 0.0 to 2.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeLevel(f64);

impl VolumeLevel {
    /// Unity gain
    pub const UNITY: Self = Self(1.0);

    /// Create a volume level clamped to [0, 2]
    pub fn new(gain: f64) -> Self {
        Self(clamp_finite(gain, VOLUME_MIN, VOLUME_MAX, 1.0))
    }

    /// Linear gain multiplier
    pub fn gain(self) -> f64 {
        self.0
    }

    /// Volume as a percentage (100 = unity)
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::UNITY
    }
}

/// Snapshot of every user-adjustable setting
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringSettings {
    pub eq: EqSettings,
    pub effects: EffectsEnabled,
    pub bitcrusher: BitcrusherSettings,
    pub volume: VolumeLevel,
}

impl MasteringSettings {
    /// Clamp every value to its supported range
    pub fn validate(&mut self) {
        self.eq.validate();
        self.bitcrusher.validate();
        self.volume = VolumeLevel::new(self.volume.gain());
    }

    /// Return a validated copy
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }
}

fn clamp_finite(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_ordered_low_to_high() {
        let frequencies: Vec<f32> = EqBand::ALL.iter().map(|b| b.frequency_hz()).collect();
        assert_eq!(frequencies, vec![60.0, 250.0, 1000.0, 4000.0, 10000.0]);
        for (i, band) in EqBand::ALL.iter().enumerate() {
            assert_eq!(band.index(), i);
        }
        assert_eq!(EqBand::Bass.shape(), EqFilterShape::LowShelf);
        assert_eq!(EqBand::Mid.shape(), EqFilterShape::Peaking);
        assert_eq!(EqBand::Treble.shape(), EqFilterShape::HighShelf);
    }

    #[test]
    fn eq_gain_is_clamped() {
        let mut eq = EqSettings::default();
        eq.set_gain_db(EqBand::Mid, 45.0);
        eq.set_gain_db(EqBand::Bass, -100.0);
        eq.set_gain_db(EqBand::Treble, f64::NAN);

        assert_eq!(eq.mid, 30.0);
        assert_eq!(eq.bass, -30.0);
        assert_eq!(eq.treble, 0.0);
        assert!(!eq.is_flat());
    }

    #[test]
    fn toggling_effects() {
        let mut effects = EffectsEnabled::default();
        assert!(effects.toggle(Effect::Reverb));
        assert!(effects.reverb);
        assert!(!effects.compressor);
        assert!(!effects.toggle(Effect::Reverb));
        assert!(!effects.reverb);
    }

    #[test]
    fn eight_distinct_combinations() {
        let combos: Vec<_> = EffectsEnabled::all_combinations().collect();
        assert_eq!(combos.len(), 8);
        for (i, a) in combos.iter().enumerate() {
            for b in &combos[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn bitcrusher_clamping() {
        assert_eq!(BitcrusherSettings::new(0, 0), BitcrusherSettings::new(1, 1));
        assert_eq!(BitcrusherSettings::new(24, 99), BitcrusherSettings::new(16, 20));
        assert_eq!(BitcrusherSettings::default(), BitcrusherSettings::new(8, 4));
    }

    #[test]
    fn bitcrusher_partial_update() {
        let mut settings = BitcrusherSettings::default();
        assert!(settings.apply(BitcrusherUpdate::bit_depth(4)));
        assert_eq!(settings, BitcrusherSettings::new(4, 4));
        assert!(!settings.apply(BitcrusherUpdate::frequency_reduction(4)));
        assert!(settings.apply(BitcrusherUpdate::frequency_reduction(0)));
        assert_eq!(settings.frequency_reduction, 1);
    }

    #[test]
    fn volume_clamping() {
        assert_eq!(VolumeLevel::new(3.0).gain(), 2.0);
        assert_eq!(VolumeLevel::new(-1.0).gain(), 0.0);
        assert_eq!(VolumeLevel::new(f64::NAN), VolumeLevel::UNITY);
        assert_eq!(VolumeLevel::new(0.5).percent(), 50);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: MasteringSettings =
            serde_json::from_str(r#"{"eq": {"bass": 3.5}, "effects": {"reverb": true}, "volume": 0.8}"#)
                .unwrap();

        assert_eq!(settings.eq.bass, 3.5);
        assert_eq!(settings.eq.mid, 0.0);
        assert!(settings.effects.reverb);
        assert!(!settings.effects.compressor);
        assert_eq!(settings.bitcrusher, BitcrusherSettings::default());
        assert_eq!(settings.volume.gain(), 0.8);
    }

    #[test]
    fn validated_settings_are_in_range() {
        let settings = MasteringSettings {
            eq: EqSettings {
                bass: 99.0,
                ..EqSettings::default()
            },
            bitcrusher: BitcrusherSettings {
                bit_depth: 0,
                frequency_reduction: 50,
            },
            ..MasteringSettings::default()
        }
        .validated();

        assert_eq!(settings.eq.bass, 30.0);
        assert_eq!(settings.bitcrusher, BitcrusherSettings::new(1, 20));
    }
}
