//! Repository traits consumed by the calculation pipeline and package service.
//!
//! Concrete adapters live in `parcel-db` (`PostgreSQL`) and in
//! [`crate::memory`]. The core depends only on these traits and receives
//! flat DTOs from them.

use async_trait::async_trait;
use chrono::NaiveDate;
use parcel_types::{
    AggregatedCost, CalculationLogEntry, CompanyId, NewPackage, PackageFilter, PackageId,
    PackageInfo, PackagePage, PackageToCalc, PackageType, UserId, UserInfo,
};

/// Package types every fresh store is seeded with, in id order.
pub const DEFAULT_PACKAGE_TYPES: [&str; 3] = ["clothing", "electronics", "miscellaneous"];

/// Errors raised by repository adapters.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record changed underneath the caller (optimistic check failed).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A foreign key points at a record that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The backing store failed.
    #[error("repository backend error: {0}")]
    Backend(String),
}

/// Packages, package types, and users.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Insert a new, uncosted package owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidReference`] if the package type or
    /// user does not exist, or [`RepositoryError::Backend`] on store failure.
    async fn register_package(
        &self,
        user: UserId,
        package: &NewPackage,
    ) -> Result<PackageId, RepositoryError>;

    /// All package types, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on store failure.
    async fn package_types(&self) -> Result<Vec<PackageType>, RepositoryError>;

    /// One page of `user`'s packages matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on store failure.
    async fn packages_for_user(
        &self,
        user: UserId,
        filter: &PackageFilter,
    ) -> Result<PackagePage, RepositoryError>;

    /// A single package, only if it belongs to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on store failure.
    async fn package(
        &self,
        user: UserId,
        package_id: PackageId,
    ) -> Result<Option<PackageInfo>, RepositoryError>;

    /// Fetch `user`, creating it if unknown, and refresh its access time.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on store failure.
    async fn get_or_create_user(&self, user: UserId) -> Result<UserInfo, RepositoryError>;

    /// Every package whose delivery cost is still unset.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on store failure.
    async fn uncosted_packages(&self) -> Result<Vec<PackageToCalc>, RepositoryError>;

    /// Write the delivery costs of `packages` in one all-or-nothing step.
    ///
    /// Only packages whose cost is still unset are touched; returns the ids
    /// of the packages this call actually updated.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] if the update fails, in which
    /// case no package was changed.
    async fn update_delivery_costs(
        &self,
        packages: &[PackageToCalc],
    ) -> Result<Vec<PackageId>, RepositoryError>;

    /// Assign an unassigned package to a delivery company.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if the package does not exist,
    /// [`RepositoryError::Conflict`] if it is already assigned.
    async fn assign_package(
        &self,
        package_id: PackageId,
        company_id: CompanyId,
    ) -> Result<(), RepositoryError>;
}

/// Append-only log of calculated delivery costs.
#[async_trait]
pub trait CalculationLogRepository: Send + Sync {
    /// Append `entries` to the log.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] if the insert fails.
    async fn add_entries(&self, entries: &[CalculationLogEntry]) -> Result<(), RepositoryError>;

    /// Delivery costs logged on the UTC day `date`, summed per package type.
    ///
    /// Returns an empty list when nothing was logged that day.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] if the query fails.
    async fn aggregated(&self, date: NaiveDate) -> Result<Vec<AggregatedCost>, RepositoryError>;
}
