//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] and [`fred`] errors. At the trait boundary they are converted
//! into the core's [`RepositoryError`] and [`CacheError`].

use parcel_core::{CacheError, RepositoryError};

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether this is a `PostgreSQL` foreign key violation.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Self::Postgres(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            _ => false,
        }
    }
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        if err.is_foreign_key_violation() {
            return Self::InvalidReference(err.to_string());
        }
        Self::Backend(err.to_string())
    }
}

impl From<DbError> for CacheError {
    fn from(err: DbError) -> Self {
        Self::Backend(err.to_string())
    }
}
