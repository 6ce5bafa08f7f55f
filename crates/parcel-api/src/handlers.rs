//! Package and session endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/start_session` | Issue or refresh the `session_id` cookie |
//! | `POST` | `/packages/register` | Register a package for the session user |
//! | `GET` | `/package-types` | List package types |
//! | `GET` | `/my-packages` | Page through the session user's packages |
//! | `GET` | `/packages/{id}` | One package owned by the session user |
//! | `POST` | `/packages/{id}/assign` | Assign a package to a delivery company |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use parcel_core::packages::package_filter;
use parcel_types::{CompanyId, NewPackage, PackageId, PackageTypeId, RegisteredPackage};

use crate::error::ApiError;
use crate::session::{Session, session_cookie, session_from_headers};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies and query parameters
// ---------------------------------------------------------------------------

/// Query parameters for `GET /my-packages`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct MyPackagesQuery {
    /// Only packages of this type.
    pub type_id: Option<i32>,
    /// `true` for costed packages, `false` for uncosted ones.
    pub delivery_cost_calculated: Option<bool>,
    /// Number of packages to skip (default 0).
    pub offset: Option<u32>,
    /// Page size (default 10, at most 100).
    pub limit: Option<u32>,
}

/// Body of `POST /packages/{id}/assign`.
#[derive(Debug, serde::Deserialize)]
pub struct AssignRequest {
    /// Company taking the package.
    pub company_id: CompanyId,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Resume the caller's session or start a new one.
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .packages
        .start_session(session_from_headers(&headers))
        .await?;
    let cookie = session_cookie(user.id)?;

    Ok((
        [cookie],
        Json(serde_json::json!({
            "message": "Session started",
            "session_id": user.id,
        })),
    ))
}

/// Register a new, uncosted package.
pub async fn register_package(
    State(state): State<Arc<AppState>>,
    Session(user): Session,
    Json(package): Json<NewPackage>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .services
        .packages
        .register_package(user, package)
        .await?;
    Ok(Json(RegisteredPackage { id }))
}

/// List every package type.
pub async fn package_types(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let types = state.services.packages.package_types().await?;
    Ok(Json(types))
}

/// One page of the session user's packages.
pub async fn my_packages(
    State(state): State<Arc<AppState>>,
    Session(user): Session,
    Query(params): Query<MyPackagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = package_filter(
        params.type_id.map(PackageTypeId),
        params.delivery_cost_calculated,
        params.offset,
        params.limit,
    );
    let page = state.services.packages.my_packages(user, filter).await?;
    Ok(Json(page))
}

/// A single package, visible only to its owner.
pub async fn get_package(
    State(state): State<Arc<AppState>>,
    Session(user): Session,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let package_id = PackageId(id);
    let package = state
        .services
        .packages
        .package(user, package_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("package {package_id}")))?;
    Ok(Json(package))
}

/// Assign an unassigned package to a delivery company.
pub async fn assign_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let package_id = PackageId(id);
    state
        .services
        .packages
        .assign_package(package_id, body.company_id)
        .await?;
    Ok(Json(serde_json::json!({
        "package_id": package_id,
        "company_id": body.company_id,
    })))
}
