//! Package service: sessions, registration, listing, and assignment.
//!
//! A thin layer over [`PackageRepository`] that validates input and
//! normalizes paging before anything reaches the store.

use std::sync::Arc;

use parcel_types::{
    CompanyId, NewPackage, PackageFilter, PackageId, PackageInfo, PackagePage, PackageType,
    PackageTypeId, UserId, UserInfo,
};
use tracing::{debug, info};

use crate::repository::{PackageRepository, RepositoryError};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest accepted package name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Errors raised by [`PackageService`].
#[derive(Debug, thiserror::Error)]
pub enum PackageServiceError {
    /// The request was well-formed but its values are not acceptable.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The repository rejected or failed the operation.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Build a listing filter, applying the default and maximum page size.
pub fn package_filter(
    type_id: Option<PackageTypeId>,
    delivery_cost_calculated: Option<bool>,
    offset: Option<u32>,
    limit: Option<u32>,
) -> PackageFilter {
    PackageFilter {
        type_id,
        delivery_cost_calculated,
        offset: offset.unwrap_or(0),
        limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    }
}

/// Check a registration request.
///
/// # Errors
///
/// Returns [`PackageServiceError::Validation`] naming the first offending
/// field.
pub fn validate_new_package(package: &NewPackage) -> Result<(), PackageServiceError> {
    let name = package.name.trim();
    if name.is_empty() {
        return Err(PackageServiceError::Validation(
            "name must not be empty".to_owned(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(PackageServiceError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if !(package.weight.is_finite() && package.weight > 0.0) {
        return Err(PackageServiceError::Validation(
            "weight must be a positive number".to_owned(),
        ));
    }
    if !(package.content_value.is_finite() && package.content_value > 0.0) {
        return Err(PackageServiceError::Validation(
            "content_value must be a positive number".to_owned(),
        ));
    }
    Ok(())
}

/// User-facing package operations.
pub struct PackageService {
    repository: Arc<dyn PackageRepository>,
}

impl PackageService {
    /// Create a service over `repository`.
    pub fn new(repository: Arc<dyn PackageRepository>) -> Self {
        Self { repository }
    }

    /// Resume `existing` or mint a new session, recording the access.
    ///
    /// # Errors
    ///
    /// Returns [`PackageServiceError::Repository`] if the user cannot be
    /// stored.
    pub async fn start_session(
        &self,
        existing: Option<UserId>,
    ) -> Result<UserInfo, PackageServiceError> {
        let id = existing.unwrap_or_else(UserId::new);
        let user = self.repository.get_or_create_user(id).await?;
        debug!(user = %user.id, resumed = existing.is_some(), "Session started");
        Ok(user)
    }

    /// Register a package for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageServiceError::Validation`] for bad input and
    /// [`PackageServiceError::Repository`] if the type is unknown or the
    /// store fails.
    pub async fn register_package(
        &self,
        user: UserId,
        mut package: NewPackage,
    ) -> Result<PackageId, PackageServiceError> {
        validate_new_package(&package)?;
        package.name = package.name.trim().to_owned();

        // Sessions may outlive the user row in a fresh database.
        self.repository.get_or_create_user(user).await?;
        let id = self.repository.register_package(user, &package).await?;
        info!(
            package_id = %id,
            user = %user,
            type_id = %package.type_id,
            "Package registered"
        );
        Ok(id)
    }

    /// Every package type, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`PackageServiceError::Repository`] if the store fails.
    pub async fn package_types(&self) -> Result<Vec<PackageType>, PackageServiceError> {
        Ok(self.repository.package_types().await?)
    }

    /// One page of `user`'s packages.
    ///
    /// # Errors
    ///
    /// Returns [`PackageServiceError::Repository`] if the store fails.
    pub async fn my_packages(
        &self,
        user: UserId,
        filter: PackageFilter,
    ) -> Result<PackagePage, PackageServiceError> {
        let filter = PackageFilter {
            limit: filter.limit.clamp(1, MAX_PAGE_SIZE),
            ..filter
        };
        Ok(self.repository.packages_for_user(user, &filter).await?)
    }

    /// A single package, visible only to its owner.
    ///
    /// # Errors
    ///
    /// Returns [`PackageServiceError::Repository`] if the store fails.
    pub async fn package(
        &self,
        user: UserId,
        package_id: PackageId,
    ) -> Result<Option<PackageInfo>, PackageServiceError> {
        Ok(self.repository.package(user, package_id).await?)
    }

    /// Hand an unassigned package to a delivery company.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] (wrapped) if the package is
    /// already assigned and [`RepositoryError::NotFound`] if it does not
    /// exist.
    pub async fn assign_package(
        &self,
        package_id: PackageId,
        company_id: CompanyId,
    ) -> Result<(), PackageServiceError> {
        self.repository
            .assign_package(package_id, company_id)
            .await?;
        info!(package_id = %package_id, company_id = %company_id, "Package assigned");
        Ok(())
    }
}
