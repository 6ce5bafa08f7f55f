//! Core entity structs for the parcel delivery-cost service.
//!
//! The calculation pipeline never traverses object graphs: repositories hand
//! it flat DTOs such as [`PackageToCalc`] with foreign keys as plain ids, and
//! perform any joins themselves.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::CalculationOutcome;
use crate::ids::{PackageId, PackageTypeId, UserId};

// ---------------------------------------------------------------------------
// Package types
// ---------------------------------------------------------------------------

/// Static reference data: what kind of goods a package holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PackageType {
    /// Package type identifier.
    pub id: PackageTypeId,
    /// Display name, unique across types.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

/// Request body for registering a new package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewPackage {
    /// Free-form package name (at most 255 characters).
    pub name: String,
    /// Weight in kilograms, strictly positive.
    pub weight: f64,
    /// Declared value of the contents, strictly positive.
    pub content_value: f64,
    /// The package type.
    pub type_id: PackageTypeId,
}

/// Response body for a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RegisteredPackage {
    /// The identifier assigned to the new package.
    pub id: PackageId,
}

/// A package as shown to its owner, joined with its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PackageInfo {
    /// Package identifier.
    pub id: PackageId,
    /// Package name.
    pub name: String,
    /// Weight in kilograms.
    pub weight: f64,
    /// Declared value of the contents.
    pub content_value: f64,
    /// Delivery cost; `None` until the calculation job has costed it.
    pub delivery_cost: Option<f64>,
    /// The package's type.
    pub package_type: PackageType,
}

/// One page of a user's packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PackagePage {
    /// 1-based page number derived from `offset / limit`.
    pub page: u32,
    /// Maximum number of packages per page.
    pub page_size: u32,
    /// Total number of packages matching the filter.
    pub total_items: u64,
    /// Packages on this page.
    pub data: Vec<PackageInfo>,
}

/// Filter and paging parameters for listing a user's packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageFilter {
    /// Only packages of this type.
    pub type_id: Option<PackageTypeId>,
    /// `Some(true)` for costed packages, `Some(false)` for uncosted ones.
    pub delivery_cost_calculated: Option<bool>,
    /// Number of packages to skip.
    pub offset: u32,
    /// Maximum number of packages to return (already clamped, non-zero).
    pub limit: u32,
}

impl PackageFilter {
    /// The 1-based page number this filter selects.
    pub const fn page(&self) -> u32 {
        match self.offset.checked_div(self.limit) {
            Some(page) => page.saturating_add(1),
            None => 1,
        }
    }
}

/// Flat projection of a package used by the cost calculation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageToCalc {
    /// Package identifier.
    pub id: PackageId,
    /// Foreign key to the package type.
    pub package_type_id: PackageTypeId,
    /// Package name.
    pub name: String,
    /// Weight in kilograms.
    pub weight: f64,
    /// Declared value of the contents.
    pub content_value: f64,
    /// Delivery cost; `None` when selected, filled in by the job.
    pub delivery_cost: Option<f64>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A user known to the service, identified by session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserInfo {
    /// Session identifier.
    pub id: UserId,
    /// Last time the session was started or refreshed.
    pub last_access_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Calculation log
// ---------------------------------------------------------------------------

/// Append-only record that a package was costed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationLogEntry {
    /// The costed package.
    pub package_id: PackageId,
    /// The costed package's type.
    pub package_type_id: PackageTypeId,
    /// The cost that was written.
    pub delivery_cost: f64,
    /// When the cost was computed (UTC).
    pub date: DateTime<Utc>,
}

/// Sum of delivery costs for one package type on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AggregatedCost {
    /// The package type.
    pub package_type_id: PackageTypeId,
    /// The UTC calendar day, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Sum of `delivery_cost` over the day's log entries for this type.
    pub delivery_cost_sum: f64,
}

// ---------------------------------------------------------------------------
// Calculation report
// ---------------------------------------------------------------------------

/// Summary of one run of the delivery-cost calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CalculationReport {
    /// Business date used for the rate lookup.
    pub date_code: NaiveDate,
    /// Currency the rate was resolved for.
    pub currency: String,
    /// The resolved rate, if any.
    pub rate: Option<f64>,
    /// Number of packages that received a delivery cost.
    pub packages_costed: u64,
    /// How the run ended.
    pub outcome: CalculationOutcome,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_cost_date_serializes_as_iso_day() {
        let row = AggregatedCost {
            package_type_id: PackageTypeId(1),
            date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            delivery_cost_sum: 315.0,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["date"], "2024-05-03");
        assert_eq!(json["package_type_id"], 1);
    }

    #[test]
    fn uncosted_package_info_serializes_null_cost() {
        let info = PackageInfo {
            id: PackageId(1),
            name: String::from("Test Package"),
            weight: 1.5,
            content_value: 100.0,
            delivery_cost: None,
            package_type: PackageType {
                id: PackageTypeId(1),
                name: String::from("clothing"),
            },
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json["delivery_cost"].is_null());
        assert_eq!(json["package_type"]["name"], "clothing");
    }

    #[test]
    fn filter_page_is_one_based() {
        let mut filter = PackageFilter {
            type_id: None,
            delivery_cost_calculated: None,
            offset: 0,
            limit: 10,
        };
        assert_eq!(filter.page(), 1);
        filter.offset = 25;
        assert_eq!(filter.page(), 3);
        filter.limit = 0;
        assert_eq!(filter.page(), 1);
    }

    #[test]
    fn new_package_deserializes_from_request_body() {
        let body = r#"{"name":"Test Package","weight":1.5,"content_value":100.0,"type_id":1}"#;
        let package: NewPackage = serde_json::from_str(body).unwrap();
        assert_eq!(package.type_id, PackageTypeId(1));
        assert_eq!(package.name, "Test Package");
    }
}
