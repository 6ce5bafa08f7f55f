//! Error types for the server binary.
//!
//! [`AppError`] wraps every failure mode of startup and execution so that
//! `main` can propagate with `?`.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: parcel_core::ConfigError,
    },

    /// Database or cache connection failed.
    #[error("storage error: {source}")]
    Db {
        /// The underlying storage error.
        #[from]
        source: parcel_db::DbError,
    },

    /// The currency source client could not be built.
    #[error("rate source error: {source}")]
    RateSource {
        /// The underlying rate source error.
        #[from]
        source: parcel_core::RateSourceError,
    },

    /// A one-shot calculation run failed.
    #[error("calculation error: {source}")]
    Calculation {
        /// The underlying calculation error.
        #[from]
        source: parcel_core::CalculationError,
    },

    /// The HTTP server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: parcel_api::ServerError,
    },
}
