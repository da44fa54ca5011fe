//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The underlying sqlx, I/O or
//! collaborator error is kept as a child frame of the raised kind.
//!
//! A stale cache is deliberately *not* an error: validation folds every
//! failure into [`Freshness::Stale`](crate::Freshness::Stale).

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A query or write against the store failed.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The store file (or one of its WAL siblings) could not be removed.
    #[display("I/O error")]
    Io,
    /// The rebuild pipeline failed; the store has been marked for rebuild on
    /// the next open.
    #[display("cache rebuild failed")]
    Rebuild,
    /// A catalog extractor failed to enumerate its domain.
    #[display("catalog extractor error")]
    Extractor,
    /// The dependency resolver failed.
    #[display("dependency resolver error")]
    Resolver,
    /// The mod list could not be read.
    #[display("mod list error")]
    ModList,
    /// Rebuilding requires a concrete content language.
    #[display("a content language must be specified to rebuild the cache")]
    LanguageRequired,
    /// A table or column name is not a plain SQL identifier.
    #[display("invalid identifier: {_0}")]
    InvalidIdentifier(#[error(not(source))] String),
    /// A stored or supplied value could not be converted.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A failed rebuild leaves the `needs_rebuild` marker behind, so the
        // next open retries it.
        matches!(self, Self::Database | Self::Io | Self::Rebuild)
    }
}
