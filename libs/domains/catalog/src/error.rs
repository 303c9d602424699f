use std::path::PathBuf;
use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur in the catalog domain
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A provider, section or environment referenced by an operation is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog file exists but is not a well-formed catalog document
    #[error("Malformed catalog file {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the catalog file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The in-memory document could not be rendered
    #[error("Failed to serialize catalog: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}
