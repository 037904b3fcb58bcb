mod audio;
mod settings;

pub use audio::{DecodedAudio, SampleRate};
pub use settings::{
    BitcrusherSettings, BitcrusherUpdate, Effect, EffectsEnabled, EqBand, EqFilterShape,
    EqSettings, MasteringSettings, VolumeLevel, BIT_DEPTH_MAX, BIT_DEPTH_MIN, EQ_GAIN_MAX_DB,
    EQ_GAIN_MIN_DB, FREQUENCY_REDUCTION_MAX, VOLUME_MAX, VOLUME_MIN,
};
