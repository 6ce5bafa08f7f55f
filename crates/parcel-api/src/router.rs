//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::calculation;
use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `POST /run_calculation` -- run the cost calculation now
/// - `POST /aggregated_data` -- daily cost sums per package type
/// - `GET /start_session` -- issue the session cookie
/// - `POST /packages/register` -- register a package
/// - `GET /package-types` -- list package types
/// - `GET /my-packages` -- page through the caller's packages
/// - `GET /packages/{id}` -- one of the caller's packages
/// - `POST /packages/{id}/assign` -- assign a package to a company
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Calculation triggers
        .route("/run_calculation", post(calculation::run_calculation))
        .route("/aggregated_data", post(calculation::aggregated_data))
        // Packages
        .route("/start_session", get(handlers::start_session))
        .route("/packages/register", post(handlers::register_package))
        .route("/package-types", get(handlers::package_types))
        .route("/my-packages", get(handlers::my_packages))
        .route("/packages/{id}", get(handlers::get_package))
        .route("/packages/{id}/assign", post(handlers::assign_package))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
