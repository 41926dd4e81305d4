//! Error types for package generation

use thiserror::Error;

use graph_store::backend::BackendError;
use graph_store::storage::StorageError;

/// Result type alias using RemixError
pub type Result<T> = std::result::Result<T, RemixError>;

#[derive(Debug, Error)]
pub enum RemixError {
    /// Nothing was selected
    #[error("Select at least one element to generate a package")]
    EmptySelection,

    /// Package name is empty or not a valid npm-style name
    #[error("Invalid package name '{0}'")]
    InvalidName(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
