//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// How a single run of the delivery-cost calculation ended.
///
/// Only persistence failures are reported as errors; every other way a run
/// can end is one of these outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CalculationOutcome {
    /// A rate was resolved and every uncosted package was costed.
    Completed,
    /// A rate was resolved but no package was waiting for a cost.
    NoPendingPackages,
    /// No exchange rate could be resolved; nothing was written.
    RateUnavailable,
}

impl CalculationOutcome {
    /// Whether the run wrote anything to the package store.
    pub const fn mutated(self) -> bool {
        matches!(self, Self::Completed)
    }
}
