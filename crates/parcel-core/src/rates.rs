//! Exchange rate resolver.
//!
//! Cache-aside lookup of today's rate for a currency: the rate cache is
//! consulted first under a business-date key, and only on a miss is the
//! external daily table fetched. A successful fetch writes *every* currency
//! in the table to the cache, so the rest of the business day is served
//! without another external call.
//!
//! Expected failures (network, non-2xx, malformed payload, currency missing
//! from the table) are absorbed into `None`; the resolver never fabricates
//! a rate.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::calendar::{Clock, business_date, rate_cache_key};
use crate::rate_source::{RateSource, RateTable};
use crate::storage::TemporaryStorage;

/// Resolves the current business day's exchange rate for a currency.
pub struct ExchangeRateResolver {
    storage: Arc<dyn TemporaryStorage>,
    source: Arc<dyn RateSource>,
    clock: Arc<dyn Clock>,
}

impl ExchangeRateResolver {
    /// Create a resolver over the given cache, source, and clock.
    pub fn new(
        storage: Arc<dyn TemporaryStorage>,
        source: Arc<dyn RateSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            source,
            clock,
        }
    }

    /// Today's business date according to the injected clock.
    pub fn date_code(&self) -> NaiveDate {
        business_date(self.clock.today())
    }

    /// The rate for `currency` on the current business date, or `None` if
    /// it cannot be obtained.
    pub async fn current_rate(&self, currency: &str) -> Option<f64> {
        let date_code = self.date_code();
        let key = rate_cache_key(date_code, currency);

        if let Some(rate) = self.cached_rate(&key).await {
            debug!(currency, %date_code, rate, "Exchange rate served from cache");
            return Some(rate);
        }

        let table = match self.source.fetch_daily_rates().await {
            Ok(table) => table,
            Err(e) => {
                warn!(currency, %date_code, error = %e, "Failed to fetch daily exchange rates");
                return None;
            }
        };

        self.populate_cache(date_code, &table).await;

        let rate = table.get(currency);
        match rate {
            Some(rate) => info!(currency, %date_code, rate, "Exchange rate fetched"),
            None => warn!(
                currency,
                %date_code,
                currencies = table.len(),
                "Currency absent from daily rate table"
            ),
        }
        rate
    }

    async fn cached_rate(&self, key: &str) -> Option<f64> {
        let raw = match self.storage.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Rate cache read failed, treating as miss");
                return None;
            }
        };

        match raw.parse::<f64>() {
            Ok(rate) if rate.is_finite() => Some(rate),
            _ => {
                warn!(key, value = raw, "Unparseable cached rate, treating as miss");
                None
            }
        }
    }

    async fn populate_cache(&self, date_code: NaiveDate, table: &RateTable) {
        for (code, rate) in table.iter() {
            let key = rate_cache_key(date_code, code);
            if let Err(e) = self.storage.save_no_expiry(&key, &rate.to_string()).await {
                warn!(key, error = %e, "Rate cache write failed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::calendar::FixedClock;
    use crate::memory::{MemoryRateSource, MemoryTemporaryStorage};
    use crate::storage::CacheError;

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()
    }

    fn resolver_on(
        date: NaiveDate,
        storage: Arc<dyn TemporaryStorage>,
        source: Arc<MemoryRateSource>,
    ) -> ExchangeRateResolver {
        ExchangeRateResolver::new(storage, source, Arc::new(FixedClock::at_noon(date)))
    }

    fn assert_rate(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[tokio::test]
    async fn miss_fetches_once_then_serves_every_currency_from_cache() {
        let storage = Arc::new(MemoryTemporaryStorage::new());
        let source = Arc::new(MemoryRateSource::new(RateTable::from_pairs([
            ("USD", 90.0),
            ("EUR", 98.5),
        ])));
        let resolver = resolver_on(friday(), storage.clone(), source.clone());

        assert_rate(resolver.current_rate("USD").await, 90.0);
        assert_rate(resolver.current_rate("USD").await, 90.0);
        assert_rate(resolver.current_rate("EUR").await, 98.5);
        assert_eq!(source.fetch_count(), 1);

        assert_eq!(
            storage.get("2024-05-03EUR").await.unwrap().as_deref(),
            Some("98.5")
        );
    }

    #[tokio::test]
    async fn cache_hit_skips_source() {
        let storage = Arc::new(MemoryTemporaryStorage::new());
        storage.save_no_expiry("2024-05-03USD", "91.25").await.unwrap();
        let source = Arc::new(MemoryRateSource::unavailable());
        let resolver = resolver_on(friday(), storage, source.clone());

        assert_rate(resolver.current_rate("USD").await, 91.25);
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn weekend_uses_friday_key() {
        let storage = Arc::new(MemoryTemporaryStorage::new());
        storage.save_no_expiry("2024-05-03USD", "90").await.unwrap();
        let source = Arc::new(MemoryRateSource::unavailable());
        let sunday = NaiveDate::from_ymd_opt(2024, 5, 5).unwrap();
        let resolver = resolver_on(sunday, storage, source.clone());

        assert_eq!(resolver.date_code(), friday());
        assert_rate(resolver.current_rate("USD").await, 90.0);
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn currency_absent_from_table_is_none_but_others_are_cached() {
        let storage = Arc::new(MemoryTemporaryStorage::new());
        let source = Arc::new(MemoryRateSource::new(RateTable::from_pairs([("EUR", 98.5)])));
        let resolver = resolver_on(friday(), storage.clone(), source);

        assert!(resolver.current_rate("USD").await.is_none());
        assert!(storage.get("2024-05-03EUR").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fetch_failure_is_none_and_caches_nothing() {
        let storage = Arc::new(MemoryTemporaryStorage::new());
        let source = Arc::new(MemoryRateSource::unavailable());
        let resolver = resolver_on(friday(), storage.clone(), source);

        assert!(resolver.current_rate("USD").await.is_none());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn unparseable_cached_value_is_refetched() {
        let storage = Arc::new(MemoryTemporaryStorage::new());
        storage.save_no_expiry("2024-05-03USD", "not-a-number").await.unwrap();
        let source = Arc::new(MemoryRateSource::new(RateTable::from_pairs([("USD", 90.0)])));
        let resolver = resolver_on(friday(), storage, source.clone());

        assert_rate(resolver.current_rate("USD").await, 90.0);
        assert_eq!(source.fetch_count(), 1);
    }

    struct BrokenStorage;

    #[async_trait]
    impl TemporaryStorage for BrokenStorage {
        async fn save(&self, _: &str, _: &str, _: std::time::Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".to_owned()))
        }

        async fn save_no_expiry(&self, _: &str, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".to_owned()))
        }

        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("down".to_owned()))
        }

        async fn delete(&self, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".to_owned()))
        }
    }

    #[tokio::test]
    async fn cache_outage_falls_through_to_source() {
        let source = Arc::new(MemoryRateSource::new(RateTable::from_pairs([("USD", 90.0)])));
        let resolver = resolver_on(friday(), Arc::new(BrokenStorage), source.clone());

        assert_rate(resolver.current_rate("USD").await, 90.0);
        assert_rate(resolver.current_rate("USD").await, 90.0);
        assert_eq!(source.fetch_count(), 2);
    }
}
