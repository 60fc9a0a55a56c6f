//! Error types for gst-audio

use thiserror::Error;

/// Main error type for gst-audio
#[derive(Error, Debug)]
pub enum Error {
    /// On-disk sample rate or channel layout disagrees with the configuration
    #[error("Format mismatch in {path}: {detail}")]
    FormatMismatch { path: String, detail: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Two components were built from different audio configurations
    #[error("Configuration mismatch: expected fingerprint {expected:016x}, got {actual:016x}")]
    ConfigMismatch { expected: u64, actual: u64 },

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gst-audio operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::ShapeMismatch {
            expected: "valid shape".into(),
            actual: err.to_string(),
        }
    }
}
