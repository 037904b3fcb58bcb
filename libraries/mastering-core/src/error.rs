/// Core error types for Soul Mastering
use thiserror::Error;

/// Result type alias using `MasteringError`
pub type Result<T> = std::result::Result<T, MasteringError>;

/// Core error type for Soul Mastering
///
/// Decode and stage construction failures are recoverable: the caller reports them and
/// the user re-triggers the operation. None of them leave a half-connected chain behind.
#[derive(Error, Debug)]
pub enum MasteringError {
    /// Malformed or unsupported input file
    #[error("Decode error: {0}")]
    Decode(String),

    /// A processing stage could not be built against the current context
    #[error("Failed to construct {stage} stage: {reason}")]
    StageConstruction { stage: String, reason: String },

    /// Offline rendering failed or the context was unusable
    #[error("Render error: {0}")]
    Render(String),

    /// Operation attempted after the processing context was torn down
    #[error("Processing context is closed")]
    ContextClosed,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl MasteringError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a stage construction error
    pub fn stage_construction(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StageConstruction {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create a render error
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
