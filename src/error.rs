//! Error types for scene-depot

use thiserror::Error;

/// Main error type for scene-depot operations
#[derive(Error, Debug)]
pub enum DepotError {
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Scene already exists: {0}")]
    SceneExists(String),

    #[error("No original image for scene {scene} model {model_index}")]
    ImageNotFound { scene: String, model_index: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("Invalid file name: {0}")]
    InvalidFilename(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload exceeds size limit: {size} > {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for scene-depot operations
pub type Result<T> = std::result::Result<T, DepotError>;
