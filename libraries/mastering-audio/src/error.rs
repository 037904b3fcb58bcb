/// Audio-specific errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// Malformed or unsupported input
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// A stage could not be constructed; the previous chain is still connected
    #[error("Failed to construct {stage} stage: {reason}")]
    StageConstruction { stage: &'static str, reason: String },

    /// Offline rendering failed; no file was produced
    #[error("Render error: {0}")]
    RenderError(String),

    /// Operation attempted after the processing context was closed
    #[error("Processing context is closed")]
    ContextClosed,

    /// Playback or rebuild requested with nothing loaded
    #[error("No audio buffer loaded")]
    NoBufferLoaded,

    /// An export is already running for this session
    #[error("An export is already in progress")]
    ExportInProgress,

    /// The render thread went away
    #[error("Render thread stopped: {0}")]
    RenderThread(String),

    /// Background task failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// Output device error
    #[error("Output device error: {0}")]
    Output(String),

    /// WAV parsing error
    #[error("WAV read error: {0}")]
    WavRead(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),

    /// Core error (invalid buffer, settings)
    #[error(transparent)]
    Core(#[from] mastering_core::MasteringError),
}

impl AudioError {
    pub(crate) fn stage(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::StageConstruction {
            stage,
            reason: reason.into(),
        }
    }

    /// Check whether the error came from building a stage
    pub fn is_stage_construction(&self) -> bool {
        matches!(self, Self::StageConstruction { .. })
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        Self::WavRead(err.to_string())
    }
}

impl From<AudioError> for mastering_core::MasteringError {
    fn from(err: AudioError) -> Self {
        use mastering_core::MasteringError;

        match err {
            AudioError::DecodeError(msg) | AudioError::Symphonia(msg) | AudioError::WavRead(msg) => {
                MasteringError::Decode(msg)
            }
            AudioError::StageConstruction { stage, reason } => {
                MasteringError::stage_construction(stage, reason)
            }
            AudioError::ContextClosed => MasteringError::ContextClosed,
            AudioError::Io(e) => MasteringError::Io(e),
            AudioError::Core(e) => e,
            other => MasteringError::Render(other.to_string()),
        }
    }
}
