//! Offline rendering for export
//!
//! Builds an independent offline context sized to the source, renders the whole
//! buffer through the same stage ordering the live graph uses, and encodes the result
//! as PCM16 WAV. Nothing is shared with the live graph: playback can continue while an
//! export runs.

use crate::context::ProcessingContext;
use crate::error::{AudioError, Result};
use crate::factory::{ChainParams, EffectStageFactory};
use crate::wav::WavEncoder;
use mastering_core::{DecodedAudio, MasteringSettings};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Default name of an exported file
pub const EXPORT_FILE_NAME: &str = "mastered-audio.wav";

/// MIME type of an exported file
pub const EXPORT_MIME_TYPE: &str = "audio/wav";

/// A finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    /// Wrap encoded WAV bytes with the default name and MIME type
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            file_name: EXPORT_FILE_NAME.to_string(),
            mime_type: EXPORT_MIME_TYPE,
            bytes,
        }
    }

    /// Write the file to `path`
    ///
    /// # Errors
    /// Returns any I/O error
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Saved export");
        Ok(())
    }

    /// Write the file into `dir` under its own name, returning the full path
    ///
    /// # Errors
    /// Returns any I/O error
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        self.save(&path)?;
        Ok(path)
    }
}

/// Renders a source through the mastering chain without real-time pacing
#[derive(Debug, Clone, Default)]
pub struct OfflineRenderer {
    factory: EffectStageFactory,
}

impl OfflineRenderer {
    /// Renderer with the default stage factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer with a custom stage factory
    pub fn with_factory(factory: EffectStageFactory) -> Self {
        Self { factory }
    }

    /// Render the full source
    ///
    /// The result has the source's channel count, sample rate and length; a reverb
    /// tail past the end is cut off.
    ///
    /// # Errors
    /// Stage construction failures abort the render
    pub fn render(&self, source: &DecodedAudio, settings: &MasteringSettings) -> Result<DecodedAudio> {
        let settings = settings.validated();
        let channels = u16::try_from(source.channel_count())
            .map_err(|_| AudioError::RenderError(format!("{} channels is too many", source.channel_count())))?;

        let ctx = ProcessingContext::offline(channels, source.frames(), source.sample_rate().as_hz());
        let result = self.render_in(&ctx, source, &settings);
        ctx.close();
        result
    }

    /// Render and encode as PCM16 WAV
    ///
    /// # Errors
    /// See [`render`](Self::render)
    pub fn render_wav(&self, source: &DecodedAudio, settings: &MasteringSettings) -> Result<Vec<u8>> {
        let rendered = self.render(source, settings)?;
        Ok(WavEncoder::new().encode(&rendered))
    }

    /// Render, encode and wrap as an export artifact
    ///
    /// # Errors
    /// See [`render`](Self::render)
    pub fn export(&self, source: &DecodedAudio, settings: &MasteringSettings) -> Result<ExportedFile> {
        let started = Instant::now();
        let bytes = self.render_wav(source, settings)?;
        info!(
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Export finished"
        );
        Ok(ExportedFile::wav(bytes))
    }

    fn render_in(
        &self,
        ctx: &ProcessingContext,
        source: &DecodedAudio,
        settings: &MasteringSettings,
    ) -> Result<DecodedAudio> {
        let params = ChainParams::from_settings(settings);
        let mut chain = self.factory.build_chain(ctx, settings, &params)?;

        let channels = source.channel_count();
        let frames = source.frames();
        let block_frames = ctx.max_block();
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
        let mut block = vec![0.0; block_frames * channels];

        let mut cursor = 0;
        while cursor < frames {
            let len = block_frames.min(frames - cursor);
            let block = &mut block[..len * channels];

            source.write_interleaved(cursor, block, channels);
            chain.process(block, channels);

            for frame in block.chunks_exact(channels) {
                for (out, &sample) in output.iter_mut().zip(frame) {
                    out.push(sample);
                }
            }

            cursor += len;
            debug!(rendered = cursor, total = frames, "Offline render progress");
        }

        chain.disconnect_all();
        Ok(DecodedAudio::new(output, source.sample_rate())?)
    }
}
