//! Error taxonomy shared by the stores and the acquisition readers.
//!
//! Every filesystem-backed operation returns [`StoreError`]. The HTTP layer
//! maps each variant onto a status code (see [`crate::server`]); nothing in
//! the core logs an error and carries on.

use std::path::{Path, PathBuf};

/// Errors produced by the codec, path resolution and the JSON-backed stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Path traversal or a wrong extension in a user-supplied name.
    #[error("invalid file name: {0}")]
    InvalidFilename(String),

    /// The name does not encode a valid acquisition date.
    #[error("invalid filename format: {0}")]
    InvalidFormat(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold valid JSON of the expected shape.
    #[error("corrupt JSON in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration document rejected before it reaches disk.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// One of the named configuration documents is missing or unreadable.
    #[error("configuration unavailable: {name}: {reason}")]
    ConfigUnavailable { name: String, reason: String },

    /// The re-analysis subprocess could not start or exited non-zero.
    #[error("analysis process failed ({status}): {stderr}")]
    UpstreamProcessFailure { status: String, stderr: String },
}

impl StoreError {
    /// Classifies an I/O error: `ENOENT` becomes [`StoreError::NotFound`],
    /// anything else [`StoreError::Io`].
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enoent_maps_to_not_found() {
        let err = StoreError::from_io(
            Path::new("/nowhere/comments.json"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/nowhere/comments.json"));
    }

    #[test]
    fn test_other_io_errors_stay_io() {
        let err = StoreError::from_io(
            Path::new("/root/locked"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
