//! Async mastering session
//!
//! Wraps an [`AudioGraphManager`] and an [`OfflineRenderer`] for callers running on a
//! tokio runtime. Decoding and exporting are CPU-bound, so they run on the blocking
//! pool and are awaited by the controller. Only one export runs at a time.

use crate::decoder::SymphoniaDecoder;
use crate::error::{AudioError, Result};
use crate::manager::AudioGraphManager;
use crate::offline::{ExportedFile, OfflineRenderer};
use crossbeam_channel::Receiver;
use mastering_core::{AudioDecoder, DecodedAudio, MasteringSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Controller for one loaded file and its exports
pub struct MasteringSession {
    manager: AudioGraphManager,
    renderer: OfflineRenderer,
    export_lock: Arc<Mutex<()>>,
}

impl MasteringSession {
    /// Session with default settings
    pub fn new() -> Self {
        Self::with_settings(MasteringSettings::default())
    }

    /// Session starting from a settings snapshot
    pub fn with_settings(settings: MasteringSettings) -> Self {
        Self::from_parts(AudioGraphManager::with_settings(settings), OfflineRenderer::new())
    }

    /// Session built from an existing manager and renderer
    pub fn from_parts(manager: AudioGraphManager, renderer: OfflineRenderer) -> Self {
        Self {
            manager,
            renderer,
            export_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Decode a file from disk and load it
    ///
    /// The current graph is torn down before decoding starts.
    ///
    /// # Errors
    /// Decode errors, or the errors of [`AudioGraphManager::load_buffer`]
    pub async fn load_file(&mut self, path: impl Into<PathBuf>) -> Result<Receiver<Vec<f32>>> {
        let path = path.into();
        self.manager.teardown();
        info!(path = %path.display(), "Decoding file");

        let audio = tokio::task::spawn_blocking(move || SymphoniaDecoder::new().decode_file(&path))
            .await
            .map_err(|e| AudioError::Task(e.to_string()))?
            .map_err(decode_error)?;

        self.manager.load_buffer(audio)
    }

    /// Decode in-memory bytes and load them
    ///
    /// # Errors
    /// Decode errors, or the errors of [`AudioGraphManager::load_buffer`]
    pub async fn load_bytes(
        &mut self,
        bytes: Vec<u8>,
        extension_hint: Option<String>,
    ) -> Result<Receiver<Vec<f32>>> {
        self.manager.teardown();

        let audio = tokio::task::spawn_blocking(move || {
            SymphoniaDecoder::new().decode_bytes(bytes, extension_hint.as_deref())
        })
        .await
        .map_err(|e| AudioError::Task(e.to_string()))?
        .map_err(decode_error)?;

        self.manager.load_buffer(audio)
    }

    /// Load already-decoded audio
    pub fn load_audio(&mut self, audio: DecodedAudio) -> Result<Receiver<Vec<f32>>> {
        self.manager.load_buffer(audio)
    }

    /// Start an export of the loaded source with the current settings
    ///
    /// The source and settings are snapshotted now; later changes do not affect the
    /// running export. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `NoBufferLoaded` when nothing is loaded, `ExportInProgress` while another
    /// export from this session is still running
    pub fn start_export(&self) -> Result<JoinHandle<Result<ExportedFile>>> {
        let source = self.manager.source().cloned().ok_or(AudioError::NoBufferLoaded)?;
        let guard = Arc::clone(&self.export_lock).try_lock_owned().map_err(|_| {
            warn!("Rejected export: another export is running");
            AudioError::ExportInProgress
        })?;

        let settings = *self.manager.settings();
        let renderer = self.renderer.clone();
        info!(frames = source.frames(), "Starting export");

        Ok(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            renderer.export(&source, &settings)
        }))
    }

    /// Export and wait for the result
    ///
    /// # Errors
    /// See [`start_export`](Self::start_export); render errors from the task
    pub async fn export(&self) -> Result<ExportedFile> {
        self.start_export()?
            .await
            .map_err(|e| AudioError::Task(e.to_string()))?
    }

    /// Check whether an export is running
    pub fn is_exporting(&self) -> bool {
        self.export_lock.try_lock().is_err()
    }

    /// The live graph
    pub fn manager(&self) -> &AudioGraphManager {
        &self.manager
    }

    /// The live graph, for playback control and setting changes
    pub fn manager_mut(&mut self) -> &mut AudioGraphManager {
        &mut self.manager
    }
}

impl Default for MasteringSession {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(err: mastering_core::MasteringError) -> AudioError {
    match err {
        mastering_core::MasteringError::Decode(msg) => AudioError::DecodeError(msg),
        mastering_core::MasteringError::Io(e) => AudioError::Io(e),
        other => AudioError::Core(other),
    }
}
