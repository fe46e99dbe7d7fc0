//! Error taxonomy for one prediction.
//!
//! Every variant is terminal for the invocation. The `Display` text is what
//! ends up in the `{"error": ...}` payload, so those strings are part of the
//! output contract.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`PredictError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ArtifactMissing,
    InputUnreadable,
    ArtifactLoadFailed,
    PredictionFailed,
    GeneralFailure,
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Encoder file not found: {}", .0.display())]
    EncoderNotFound(PathBuf),

    #[error("No input data received")]
    NoInput,

    #[error("General error: failed to read input: {0}")]
    ReadInput(#[source] std::io::Error),

    /// Input was present but is not a JSON object.
    #[error("General error: {0}")]
    MalformedInput(String),

    #[error("Failed to load model: {0}")]
    ArtifactLoad(String),

    /// A name in `feature_order` has no computed value; the encoding bundle
    /// does not match this adapter.
    #[error("Prediction failed: feature {0:?} has no computed value")]
    MissingFeature(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("General error: {0}")]
    General(String),
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::ModelNotFound(_) | PredictError::EncoderNotFound(_) => {
                ErrorKind::ArtifactMissing
            }
            PredictError::NoInput | PredictError::ReadInput(_) | PredictError::MalformedInput(_) => {
                ErrorKind::InputUnreadable
            }
            PredictError::ArtifactLoad(_) => ErrorKind::ArtifactLoadFailed,
            PredictError::MissingFeature(_) | PredictError::Prediction(_) => {
                ErrorKind::PredictionFailed
            }
            PredictError::General(_) => ErrorKind::GeneralFailure,
        }
    }
}
