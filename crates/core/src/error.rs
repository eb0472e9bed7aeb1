/// Result alias that carries the custom [`MotionError`] type.
pub type Result<T> = std::result::Result<T, MotionError>;

/// Common error type for the core crate.
///
/// Per-frame processing never produces one of these. Errors only surface
/// while loading configuration, validating profiles or switching exercises.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    /// A profile failed validation and must not be used for a session.
    #[error("invalid profile `{exercise}`: {reason}")]
    InvalidProfile { exercise: String, reason: String },
    /// Engine tuning values are out of range.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    /// Landmark data handed over by the detector could not be interpreted.
    #[error("invalid pose snapshot: {0}")]
    InvalidSnapshot(String),
    /// No profile is registered under the requested id.
    #[error("unknown exercise `{0}`")]
    UnknownExercise(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl MotionError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_profile(exercise: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProfile {
            exercise: exercise.to_string(),
            reason: reason.into(),
        }
    }
}
