//! Soul Mastering Audio
//!
//! The audio side of the mastering pipeline: effect stages, the live graph, offline
//! export rendering and WAV I/O.
//!
//! This crate provides:
//! - Audio decoding via Symphonia (MP3, FLAC, OGG, WAV, AAC)
//! - The fixed mastering chain: 5-band EQ, compressor, convolution reverb, bitcrusher, gain
//! - A live graph with a dedicated render thread and lock-free parameter updates
//! - Offline rendering of the same chain to a PCM16 WAV file
//! - Desktop playback through CPAL (feature `desktop`)
//!
//! # Example: Exporting
//!
//! ```rust
//! use mastering_audio::OfflineRenderer;
//! use mastering_core::{DecodedAudio, EqBand, MasteringSettings, SampleRate};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = DecodedAudio::silence(2, 4_410, SampleRate::CD_QUALITY)?;
//!
//! let mut settings = MasteringSettings::default();
//! settings.eq.set_gain_db(EqBand::Bass, 3.0);
//! settings.effects.compressor = true;
//!
//! let file = OfflineRenderer::new().export(&source, &settings)?;
//! assert_eq!(file.file_name, "mastered-audio.wav");
//! assert_eq!(file.bytes.len(), 44 + 4_410 * 4);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Example: Live graph
//!
//! ```rust,no_run
//! use mastering_audio::AudioGraphManager;
//! use mastering_core::{DecodedAudio, Effect, SampleRate};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = AudioGraphManager::new();
//! let blocks = manager.load_buffer(DecodedAudio::silence(2, 44_100, SampleRate::CD_QUALITY)?)?;
//!
//! manager.play()?;
//! manager.set_volume(0.8);
//! manager.toggle_effect(Effect::Reverb)?;
//!
//! // Hand `blocks` to an output device
//! let first = blocks.recv()?;
//! assert_eq!(first.len(), 4096 * 2);
//! # Ok(())
//! # }
//! ```

pub mod context;
mod decoder;
pub mod effects;
mod error;
pub mod factory;
pub mod graph;
pub mod impulse;
pub mod manager;
pub mod offline;
#[cfg(feature = "desktop")]
pub mod output;
pub mod render;
pub mod session;
pub mod wav;

pub use context::{AudioParam, ContextKind, ContextState, ProcessingContext};
pub use decoder::SymphoniaDecoder;
pub use error::{AudioError, Result};
pub use factory::{ChainParams, EffectStageFactory};
pub use graph::{GraphNode, StageKind};
pub use impulse::{ImpulseResponse, ImpulseResponseSynthesizer};
pub use manager::{AudioGraphManager, GraphState, ManagerStatus};
pub use offline::{ExportedFile, OfflineRenderer, EXPORT_FILE_NAME, EXPORT_MIME_TYPE};
#[cfg(feature = "desktop")]
pub use output::DeviceOutput;
pub use session::MasteringSession;
pub use wav::{decode_pcm16, WavEncoder};
