//! Error types surfaced by the repository manager.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// A specialized `Result` for repository manager operations.
pub type Result<T> = std::result::Result<T, RepoVaultError>;

/// Errors the manager can surface to a caller.
///
/// Every variant keeps the context (specifier URL and/or path) needed to
/// render a useful message. The type is cheaply `Clone` because a leader
/// fetch's error must be broadcast identically to every attached waiter;
/// inner causes are held behind an `Arc` rather than re-derived per clone.
#[derive(Debug, Clone, Error)]
pub enum RepoVaultError {
    /// The provider reports the URL is not a usable repository.
    #[error("'{url}' is not a valid repository")]
    InvalidRepository {
        /// The specifier's URL.
        url: String,
        /// The provider-side cause, if any.
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation was cancelled before completion.
    #[error("operation for '{url}' was cancelled")]
    Cancelled {
        /// The specifier's URL.
        url: String,
    },

    /// A catalog or clone-directory I/O operation failed.
    #[error("i/o error at '{}'", path.display())]
    IoError {
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// An on-disk clone failed validation and the retry also failed.
    #[error("'{url}' is not a valid repository clone at '{}' after retry", path.display())]
    Corrupt {
        /// The specifier's URL.
        url: String,
        /// The path that failed validation twice.
        path: PathBuf,
    },

    /// Any other provider-side failure, not otherwise classified.
    #[error("provider error for '{url}'")]
    ProviderError {
        /// The specifier's URL.
        url: String,
        /// The underlying provider error.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The on-disk catalog file does not match the expected schema.
    /// Recovered internally by starting from an empty catalog; surfaced
    /// only when a caller explicitly asks to inspect the failure.
    #[error("catalog at '{}' is not well-formed", path.display())]
    CatalogCorrupt {
        /// Path to the catalog file.
        path: PathBuf,
        /// The deserialization failure, rendered (`serde_json::Error`
        /// isn't `Clone`).
        message: String,
    },

    /// The in-process catalog lock was poisoned by a panicking holder.
    #[error("catalog lock poisoned")]
    LockPoisoned,
}

impl RepoVaultError {
    /// Build an [`RepoVaultError::IoError`] from a path and the underlying
    /// error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Build an [`RepoVaultError::InvalidRepository`] with no inner cause.
    pub fn invalid_repository(url: impl Into<String>) -> Self {
        Self::InvalidRepository {
            url: url.into(),
            source: None,
        }
    }

    /// Build an [`RepoVaultError::ProviderError`] wrapping an arbitrary
    /// source error.
    pub fn provider(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ProviderError {
            url: url.into(),
            source: Arc::new(source),
        }
    }

    /// Build an [`RepoVaultError::CatalogCorrupt`] from a deserialization
    /// failure.
    pub fn catalog_corrupt(path: impl Into<PathBuf>, source: impl std::fmt::Display) -> Self {
        Self::CatalogCorrupt {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Whether this is a [`RepoVaultError::Cancelled`] variant.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The specifier URL this error is about, when one applies.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::InvalidRepository { url, .. }
            | Self::Cancelled { url }
            | Self::Corrupt { url, .. }
            | Self::ProviderError { url, .. } => Some(url),
            Self::IoError { .. } | Self::CatalogCorrupt { .. } | Self::LockPoisoned => None,
        }
    }
}

impl From<std::io::Error> for RepoVaultError {
    fn from(source: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: Arc::new(source),
        }
    }
}
