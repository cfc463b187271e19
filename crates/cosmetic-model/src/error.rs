use thiserror::Error;

/// Error types for loading cosmetic content
#[derive(Error, Debug)]
pub enum ModelError {
    /// The content is not valid JSON or does not match the schema
    #[error("Malformed content: {0}")]
    Json(#[from] serde_json::Error),

    /// The geometry file contains no geometry definitions
    #[error("No geometry definitions found")]
    NoGeometry,

    /// A specific geometry was requested but is not present
    #[error("Geometry '{0}' not found")]
    MissingGeometry(String),

    /// Texture dimensions must be positive
    #[error("Invalid texture size {width}x{height}")]
    InvalidTextureSize { width: u32, height: u32 },
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
