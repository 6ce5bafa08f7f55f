//! Shared type definitions for the parcel delivery-cost service.
//!
//! This crate is the single source of truth for the DTOs that flow between
//! the repository adapters, the cost calculation pipeline, and the HTTP
//! surface. API-facing types are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers for packages, types, companies, users
//! - [`enums`] -- Enumeration types (calculation outcome)
//! - [`structs`] -- Package, rate, calculation log, and report structs

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::CalculationOutcome;
pub use ids::{CompanyId, PackageId, PackageTypeId, UserId};
pub use structs::{
    AggregatedCost, CalculationLogEntry, CalculationReport, NewPackage, PackageFilter,
    PackageInfo, PackagePage, PackageToCalc, PackageType, RegisteredPackage, UserInfo,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the API-facing types.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::PackageId::export_all();
        let _ = crate::ids::PackageTypeId::export_all();
        let _ = crate::ids::CompanyId::export_all();
        let _ = crate::ids::UserId::export_all();

        // Enums
        let _ = crate::enums::CalculationOutcome::export_all();

        // Structs
        let _ = crate::structs::PackageType::export_all();
        let _ = crate::structs::NewPackage::export_all();
        let _ = crate::structs::RegisteredPackage::export_all();
        let _ = crate::structs::PackageInfo::export_all();
        let _ = crate::structs::PackagePage::export_all();
        let _ = crate::structs::UserInfo::export_all();
        let _ = crate::structs::AggregatedCost::export_all();
        let _ = crate::structs::CalculationReport::export_all();
    }
}
