//! Error types for the graph store

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Result type alias using GraphStoreError
pub type Result<T> = std::result::Result<T, GraphStoreError>;

/// Errors surfaced to callers of the graph store
///
/// Persistence failures of optimistic mutations are not in here: those are
/// logged and swallowed by the store.
#[derive(Debug, Error)]
pub enum GraphStoreError {
    /// Remote backend error (only from explicitly awaited calls like bootstrap)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Flow import/export error
    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while importing or exporting a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// The definition has no `nodes` key or an empty node list
    #[error("Flow definition must contain at least one node")]
    MissingNodes,

    /// The definition is structurally invalid
    #[error("Invalid flow definition: {0}")]
    InvalidFlow(String),

    /// The payload is not valid JSON
    #[error("Failed to parse flow: {0}")]
    Parse(String),

    /// Nodes, edges or layouts do not match the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the export file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create an invalid-flow error with a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidFlow(msg.into())
    }
}
