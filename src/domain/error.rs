use thiserror::Error;

/// Domain-level errors for the task recorder.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("{message}")]
    AudioDevice { message: String },

    #[error("Recording too short")]
    RecordingTooShort,

    #[error("Not currently recording")]
    AudioNotRecording,

    #[error("{0}")]
    Playback(String),

    #[error("{0}")]
    Camera(String),
}

impl DomainError {
    /// Human-readable message for the UI, or `fallback` when the error
    /// carries no text of its own.
    pub fn user_message(&self, fallback: &str) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
