//! Error types shared by every model-facing operation.

/// Failures surfaced by the model client and the feature layer above it.
///
/// None of these are recovered internally: callers decide whether to show a
/// message, and every retry is a manual re-submission.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// The model's output could not be parsed against the requested shape.
    #[error("model output does not match the response shape: {0}")]
    SchemaViolation(String),
    /// An audio request came back without an inline audio payload.
    #[error("response contained no audio data")]
    NoAudioData,
    /// Network or service-level failure, undifferentiated by cause.
    #[error("model service request failed: {0}")]
    Transport(String),
    /// Blank input, rejected before any network call.
    #[error("{0}")]
    Validation(String),
    /// The audio payload was present but not valid base64.
    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),
    /// The owning view was torn down while the call was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T, E = TutorError> = std::result::Result<T, E>;

impl From<reqwest::Error> for TutorError {
    fn from(err: reqwest::Error) -> Self {
        TutorError::Transport(err.to_string())
    }
}
