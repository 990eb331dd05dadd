use std::io;

use thiserror::Error;

/// Terrain and map-archive error types
#[derive(Debug, Error)]
pub enum TerrainError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The binary layout does not match the expected format
    #[error("Invalid file format: {0}")]
    Format(String),

    /// Structured binary read/write failed
    #[error("Binary layout error: {0}")]
    Binary(#[from] binrw::Error),

    /// An asset could not be found or loaded
    #[error("Asset error: {path}: {message}")]
    Asset { path: String, message: String },

    /// Configuration data is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Renderer resources could not be created
    #[error("GPU error: {0}")]
    Gpu(String),
}

impl TerrainError {
    pub fn format(message: impl Into<String>) -> Self {
        TerrainError::Format(message.into())
    }

    pub fn asset(path: impl Into<String>, message: impl Into<String>) -> Self {
        TerrainError::Asset {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for terrain operations
pub type Result<T> = std::result::Result<T, TerrainError>;
