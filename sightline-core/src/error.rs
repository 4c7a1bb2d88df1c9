use thiserror::Error;

use crate::store::StorageError;

#[derive(Error, Debug)]
pub enum SightlineError {
    #[error("Recognition timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("No recognizable result")]
    NoResult,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Recognition cancelled")]
    Cancelled,

    #[error("Image error: {0}")]
    Image(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SightlineError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NoResult | Self::Cancelled)
    }

    /// Message suitable for showing to the person holding the camera.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { .. } => {
                "Recognition took too long. Check your connection and try again.".to_string()
            }
            Self::NoResult => {
                "Could not recognize this object. Try again with the subject centered and well lit."
                    .to_string()
            }
            Self::Cancelled => "Recognition was cancelled.".to_string(),
            Self::Config(_) => "Recognition settings are invalid; defaults will be used.".to_string(),
            Self::Storage(_) => "Could not access saved settings.".to_string(),
            Self::Collaborator(_) | Self::Image(_) | Self::Serialization(_) => {
                "Something went wrong while recognizing this image.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SightlineError>;
