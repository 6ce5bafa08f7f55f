//! Delivery-cost calculation pipeline for the parcel service.
//!
//! This crate owns everything with real state transitions: resolving the
//! day's exchange rate through a cache-aside lookup, costing every uncosted
//! package in one bulk write, and aggregating the calculation log. Storage
//! and the external currency service are reached only through the traits in
//! [`storage`], [`repository`], and [`rate_source`].
//!
//! # Modules
//!
//! - [`calendar`] -- Injected clock and the business-date (weekend to Friday) rule
//! - [`storage`] -- [`TemporaryStorage`] trait for the rate cache
//! - [`repository`] -- Package and calculation-log repository traits
//! - [`rate_source`] -- External daily rate table ([`HttpRateSource`])
//! - [`rates`] -- [`ExchangeRateResolver`] (cache-aside rate lookup)
//! - [`calculator`] -- [`CostCalculator`] job and the cost formula
//! - [`reporter`] -- [`AggregationReporter`] over the calculation log
//! - [`packages`] -- [`PackageService`] (registration, queries, sessions)
//! - [`memory`] -- In-memory adapters for every collaborator trait
//! - [`services`] -- Top-level assembly of the components
//! - [`config`] -- YAML configuration with environment overrides
//! - [`scheduler`] -- Fixed-interval runner for the calculation job
//!
//! [`TemporaryStorage`]: storage::TemporaryStorage
//! [`HttpRateSource`]: rate_source::HttpRateSource
//! [`ExchangeRateResolver`]: rates::ExchangeRateResolver
//! [`CostCalculator`]: calculator::CostCalculator
//! [`AggregationReporter`]: reporter::AggregationReporter
//! [`PackageService`]: packages::PackageService

pub mod calculator;
pub mod calendar;
pub mod config;
pub mod memory;
pub mod packages;
pub mod rate_source;
pub mod rates;
pub mod reporter;
pub mod repository;
pub mod scheduler;
pub mod services;
pub mod storage;

pub use calculator::{CalculationError, CostCalculator, delivery_cost};
pub use calendar::{Clock, FixedClock, SystemClock, business_date, rate_cache_key};
pub use config::{AppConfig, ConfigError};
pub use packages::{PackageService, PackageServiceError};
pub use rate_source::{HttpRateSource, RateSource, RateSourceError, RateTable};
pub use rates::ExchangeRateResolver;
pub use reporter::AggregationReporter;
pub use repository::{CalculationLogRepository, PackageRepository, RepositoryError};
pub use scheduler::CalculationScheduler;
pub use services::{Backends, Services};
pub use storage::{CacheError, TemporaryStorage};
