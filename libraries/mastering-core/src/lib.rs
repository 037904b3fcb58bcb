//! Soul Mastering Core
//!
//! Platform-agnostic types, traits, and error handling for the mastering pipeline.
//!
//! The core crate defines:
//! - **Domain Types**: `DecodedAudio`, `MasteringSettings` and its parts
//! - **Core Traits**: `AudioDecoder`
//! - **Error Handling**: Unified `MasteringError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use mastering_core::{DecodedAudio, EqBand, MasteringSettings, SampleRate};
//!
//! let audio = DecodedAudio::silence(2, 44_100, SampleRate::CD_QUALITY).unwrap();
//! assert_eq!(audio.duration_secs(), 1.0);
//!
//! let mut settings = MasteringSettings::default();
//! settings.eq.set_gain_db(EqBand::Bass, 4.0);
//! settings.effects.reverb = true;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{MasteringError, Result};
pub use traits::AudioDecoder;
pub use types::{
    BitcrusherSettings, BitcrusherUpdate, DecodedAudio, Effect, EffectsEnabled, EqBand,
    EqFilterShape, EqSettings, MasteringSettings, SampleRate, VolumeLevel,
};
