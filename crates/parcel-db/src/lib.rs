//! Storage adapters for the parcel service (`PostgreSQL` + Redis).
//!
//! `PostgreSQL` holds packages, package types, users, and the append-only
//! calculation log. A Redis-compatible store backs the exchange-rate cache.
//! Every adapter implements one of the collaborator traits from
//! `parcel-core`, so the business logic never sees `sqlx` or `fred`.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool, configuration, schema bootstrap
//! - [`package_store`] -- [`PgPackageRepository`] (packages, types, users)
//! - [`calculation_log_store`] -- [`PgCalculationLog`] (append + daily aggregation)
//! - [`redis_storage`] -- [`RedisTemporaryStorage`] rate cache
//! - [`error`] -- Shared error types

pub mod calculation_log_store;
pub mod error;
pub mod package_store;
pub mod postgres;
pub mod redis_storage;

// Re-export primary types for convenience.
pub use calculation_log_store::PgCalculationLog;
pub use error::DbError;
pub use package_store::PgPackageRepository;
pub use postgres::{PostgresConfig, PostgresPool};
pub use redis_storage::RedisTemporaryStorage;
