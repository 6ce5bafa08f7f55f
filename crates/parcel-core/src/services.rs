//! Top-level assembly of the business services.
//!
//! [`Services::assemble`] is the single place where collaborators are wired
//! together; every component receives its dependencies as constructor
//! arguments.

use std::sync::Arc;

use crate::calculator::CostCalculator;
use crate::calendar::Clock;
use crate::packages::PackageService;
use crate::rate_source::RateSource;
use crate::rates::ExchangeRateResolver;
use crate::reporter::AggregationReporter;
use crate::repository::{CalculationLogRepository, PackageRepository};
use crate::storage::TemporaryStorage;

/// Concrete collaborators the services are built from.
pub struct Backends {
    /// Package, package type, and user store.
    pub repository: Arc<dyn PackageRepository>,
    /// Append-only calculation log.
    pub calculation_log: Arc<dyn CalculationLogRepository>,
    /// Rate cache.
    pub storage: Arc<dyn TemporaryStorage>,
    /// External daily rate table.
    pub rate_source: Arc<dyn RateSource>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// The assembled business services.
#[derive(Clone)]
pub struct Services {
    /// Package CRUD operations.
    pub packages: Arc<PackageService>,
    /// Delivery-cost calculation job.
    pub calculator: Arc<CostCalculator>,
    /// Daily aggregation over the calculation log.
    pub reporter: Arc<AggregationReporter>,
}

impl Services {
    /// Wire `backends` into services that price in `currency`.
    pub fn assemble(backends: Backends, currency: &str) -> Self {
        let resolver = ExchangeRateResolver::new(
            backends.storage,
            backends.rate_source,
            Arc::clone(&backends.clock),
        );
        let calculator = CostCalculator::new(
            Arc::clone(&backends.repository),
            Arc::clone(&backends.calculation_log),
            resolver,
            backends.clock,
            currency,
        );

        Self {
            packages: Arc::new(PackageService::new(backends.repository)),
            calculator: Arc::new(calculator),
            reporter: Arc::new(AggregationReporter::new(backends.calculation_log)),
        }
    }
}
