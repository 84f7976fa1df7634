//! Error types for blobwatch

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a video backend while it is being opened or read.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Video file ({}) was not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("Decoder error: {0}")]
    Decoder(String),
}

#[derive(Error, Debug)]
pub enum BlobwatchError {
    #[error("Source setup failed: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings document error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, BlobwatchError>;
