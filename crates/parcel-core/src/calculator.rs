//! Cost calculation job.
//!
//! One run resolves today's rate, selects every package whose delivery
//! cost is still null, prices them with [`delivery_cost`], writes the costs
//! in a single bulk update, and appends one calculation log entry per
//! package that update actually changed.
//!
//! The job is the only writer of `delivery_cost`. Runs inside one process
//! are serialized by a lease, so an overlapping trigger waits and then finds
//! nothing left to cost. The update and its log append run as one spawned
//! task that owns the lease; dropping the caller cannot separate them.

use std::collections::HashSet;
use std::sync::Arc;

use parcel_types::{
    CalculationLogEntry, CalculationOutcome, CalculationReport, PackageId, PackageToCalc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};

use crate::calendar::Clock;
use crate::rates::ExchangeRateResolver;
use crate::repository::{CalculationLogRepository, PackageRepository, RepositoryError};

/// Cost per unit of weight, in the calculation currency.
pub const WEIGHT_FACTOR: f64 = 0.5;

/// Share of the declared content value charged, in the calculation currency.
pub const CONTENT_VALUE_FACTOR: f64 = 0.01;

/// Price one package: `(weight * 0.5 + content_value * 0.01) * rate`.
pub fn delivery_cost(weight: f64, content_value: f64, rate: f64) -> f64 {
    weight.mul_add(WEIGHT_FACTOR, content_value * CONTENT_VALUE_FACTOR) * rate
}

/// Errors that fail a calculation run.
#[derive(Debug, thiserror::Error)]
pub enum CalculationError {
    /// Selecting or updating packages failed; nothing was written.
    #[error("package repository failed: {0}")]
    Repository(#[source] RepositoryError),

    /// Costs were committed but the calculation log could not be appended.
    #[error("calculation log append failed: {0}")]
    CalculationLog(#[source] RepositoryError),

    /// The commit task panicked or was cancelled by runtime shutdown.
    #[error("calculation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs the delivery-cost calculation.
pub struct CostCalculator {
    repository: Arc<dyn PackageRepository>,
    calculation_log: Arc<dyn CalculationLogRepository>,
    resolver: ExchangeRateResolver,
    clock: Arc<dyn Clock>,
    currency: String,
    run_lease: Arc<Mutex<()>>,
}

impl CostCalculator {
    /// Create a calculator pricing in `currency`.
    pub fn new(
        repository: Arc<dyn PackageRepository>,
        calculation_log: Arc<dyn CalculationLogRepository>,
        resolver: ExchangeRateResolver,
        clock: Arc<dyn Clock>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            calculation_log,
            resolver,
            clock,
            currency: currency.into(),
            run_lease: Arc::new(Mutex::new(())),
        }
    }

    /// The currency costs are computed in.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Execute one calculation pass.
    ///
    /// An unavailable rate or an empty backlog is a successful run with the
    /// matching [`CalculationOutcome`]; no package is touched in either case.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::Repository`] if packages cannot be read
    /// or the bulk update fails, and [`CalculationError::CalculationLog`] if
    /// the log append fails after the costs were committed.
    /// [`CalculationError::Task`] means the commit task itself died.
    pub async fn run(&self) -> Result<CalculationReport, CalculationError> {
        let lease = Arc::clone(&self.run_lease).lock_owned().await;

        let date_code = self.resolver.date_code();
        let mut report = CalculationReport {
            date_code,
            currency: self.currency.clone(),
            rate: None,
            packages_costed: 0,
            outcome: CalculationOutcome::RateUnavailable,
        };

        let Some(rate) = self.resolver.current_rate(&self.currency).await else {
            error!(
                severity = "critical",
                currency = self.currency,
                %date_code,
                "Exchange rate unavailable, calculation aborted"
            );
            return Ok(report);
        };
        report.rate = Some(rate);

        let mut packages = self
            .repository
            .uncosted_packages()
            .await
            .map_err(CalculationError::Repository)?;
        if packages.is_empty() {
            info!(currency = self.currency, rate, "No packages awaiting a delivery cost");
            report.outcome = CalculationOutcome::NoPendingPackages;
            return Ok(report);
        }

        price_packages(&mut packages, rate);
        let selected = packages.len();

        let commit = tokio::spawn(commit_costs(
            Arc::clone(&self.repository),
            Arc::clone(&self.calculation_log),
            Arc::clone(&self.clock),
            packages,
            lease,
        ));
        let costed = commit.await??;
        report.packages_costed = u64::try_from(costed).unwrap_or(u64::MAX);
        report.outcome = CalculationOutcome::Completed;

        info!(
            currency = self.currency,
            rate,
            %date_code,
            selected,
            costed,
            "Delivery cost calculation complete"
        );
        Ok(report)
    }
}

/// Write the priced costs, then log the packages this update changed.
///
/// Holds the run lease until both steps are done.
async fn commit_costs(
    repository: Arc<dyn PackageRepository>,
    calculation_log: Arc<dyn CalculationLogRepository>,
    clock: Arc<dyn Clock>,
    packages: Vec<PackageToCalc>,
    _lease: OwnedMutexGuard<()>,
) -> Result<usize, CalculationError> {
    let updated = repository
        .update_delivery_costs(&packages)
        .await
        .map_err(|e| {
            error!(error = %e, count = packages.len(), "Bulk delivery cost update failed");
            CalculationError::Repository(e)
        })?;

    let entries = log_entries(&packages, &updated, &*clock);
    if entries.is_empty() {
        return Ok(0);
    }
    calculation_log.add_entries(&entries).await.map_err(|e| {
        error!(
            severity = "critical",
            error = %e,
            count = entries.len(),
            "Calculation log append failed after costs were committed"
        );
        CalculationError::CalculationLog(e)
    })?;
    Ok(updated.len())
}

fn price_packages(packages: &mut [PackageToCalc], rate: f64) {
    for package in packages {
        package.delivery_cost = Some(delivery_cost(package.weight, package.content_value, rate));
    }
}

fn log_entries(
    packages: &[PackageToCalc],
    updated: &[PackageId],
    clock: &dyn Clock,
) -> Vec<CalculationLogEntry> {
    let updated: HashSet<PackageId> = updated.iter().copied().collect();
    let now = clock.now();
    packages
        .iter()
        .filter(|package| updated.contains(&package.id))
        .filter_map(|package| {
            package.delivery_cost.map(|cost| CalculationLogEntry {
                package_id: package.id,
                package_type_id: package.package_type_id,
                delivery_cost: cost,
                date: now,
            })
        })
        .collect()
}
