//! HTTP API for the parcel service.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Trigger endpoints** to run the delivery-cost calculation on demand
//!   and to read the daily aggregation of the calculation log
//! - **Package endpoints** to register, list, fetch, and assign packages
//! - **Session issuance** via a `session_id` cookie
//!
//! All business logic lives in `parcel-core`; handlers only parse requests,
//! call into [`Services`], and map errors to JSON responses.
//!
//! [`Services`]: parcel_core::Services

pub mod calculation;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use session::{SESSION_COOKIE, Session};
pub use state::AppState;
