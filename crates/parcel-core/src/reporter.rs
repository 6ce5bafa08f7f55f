//! Aggregation reporter: daily delivery-cost sums per package type.

use std::sync::Arc;

use chrono::NaiveDate;
use parcel_types::AggregatedCost;
use tracing::debug;

use crate::repository::{CalculationLogRepository, RepositoryError};

/// Read-only view over the calculation log.
pub struct AggregationReporter {
    calculation_log: Arc<dyn CalculationLogRepository>,
}

impl AggregationReporter {
    /// Create a reporter over `calculation_log`.
    pub fn new(calculation_log: Arc<dyn CalculationLogRepository>) -> Self {
        Self { calculation_log }
    }

    /// Sum of delivery costs per package type for the UTC day `date`.
    ///
    /// A day with no entries yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the log store cannot be queried.
    pub async fn aggregated(&self, date: NaiveDate) -> Result<Vec<AggregatedCost>, RepositoryError> {
        let rows = self.calculation_log.aggregated(date).await?;
        debug!(%date, groups = rows.len(), "Aggregated delivery costs");
        Ok(rows)
    }
}
