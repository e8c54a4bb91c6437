//! # Cache Error Types

use thiserror::Error;

/// Errors from the on-disk artifact store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure (disk full, permissions, missing root).
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A staged artifact was empty at commit time.
    #[error("refusing to cache empty artifact {0}")]
    EmptyArtifact(String),
}
