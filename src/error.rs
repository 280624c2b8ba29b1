use std::io;
use thiserror::Error;

/// Errors raised while running a scan pipeline or loading its configuration
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("empty image handed to {0}")]
    EmptyImage(&'static str),

    #[error("region {0} lies outside the frame")]
    Geometry(String),

    #[error("frame is {actual} but the camera reported {expected}")]
    ExtentMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("text recognition failed: {0}")]
    Ocr(String),
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ScanError {
    fn from(err: toml::ser::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
