//! Shared application state for the API server.

use parcel_core::Services;

/// State handed to every handler, wrapped in an `Arc` by the router.
#[derive(Clone)]
pub struct AppState {
    /// The assembled business services.
    pub services: Services,
}

impl AppState {
    /// Wrap the assembled `services`.
    pub const fn new(services: Services) -> Self {
        Self { services }
    }
}
