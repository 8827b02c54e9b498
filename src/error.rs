//! Unified error type.

use std::fmt;

/// The error type returned by aapje's fallible operations.
///
/// A missing route is not an `Error`: the router answers it with a 404
/// [`Response`](crate::Response) directly. Everything a handler can fail
/// with lands here and is turned into the router's error response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A table, column or order-by name failed the identifier allow-list.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A limit, sort direction, or data/condition shape was rejected.
    #[error("{0}")]
    InvalidArgument(String),

    /// The database driver failed to connect, prepare or execute.
    #[error("{0}")]
    Database(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Free-form failure raised from inside a handler.
    #[error("{0}")]
    Handler(String),
}

impl Error {
    /// Builds a handler error from any displayable message.
    ///
    /// ```rust
    /// # use aapje::Error;
    /// let err = Error::msg("user 7 is locked");
    /// assert_eq!(err.to_string(), "user 7 is locked");
    /// ```
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }

    /// `true` for query-builder validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_) | Self::InvalidArgument(_))
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for Error {
    fn from(e: mysql_async::Error) -> Self {
        Self::Database(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
