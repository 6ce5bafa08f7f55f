//! In-memory adapters for every collaborator trait.
//!
//! These back the unit and API tests and let the pipeline run without
//! `PostgreSQL` or Redis. Each adapter keeps its state behind a single
//! [`tokio::sync::Mutex`], so every operation is atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parcel_types::{
    AggregatedCost, CalculationLogEntry, CompanyId, NewPackage, PackageFilter, PackageId,
    PackageInfo, PackagePage, PackageToCalc, PackageType, PackageTypeId, UserId, UserInfo,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::rate_source::{RateSource, RateSourceError, RateTable};
use crate::repository::{
    CalculationLogRepository, DEFAULT_PACKAGE_TYPES, PackageRepository, RepositoryError,
};
use crate::storage::{CacheError, TemporaryStorage};

// ---------------------------------------------------------------------------
// Rate cache
// ---------------------------------------------------------------------------

struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }
}

/// [`TemporaryStorage`] backed by a `HashMap` with lazy expiry.
#[derive(Default)]
pub struct MemoryTemporaryStorage {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryTemporaryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TemporaryStorage for MemoryTemporaryStorage {
    async fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value: value.to_owned(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock().await.insert(key.to_owned(), entry);
        debug!(key, "Cache PUT");
        Ok(())
    }

    async fn save_no_expiry(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expires_at = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at);
        entries.insert(
            key.to_owned(),
            CacheEntry {
                value: value.to_owned(),
                expires_at,
            },
        );
        debug!(key, "Cache PUT (keep ttl)");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                debug!(key, "Cache HIT");
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                debug!(key, "Cache entry expired");
                Ok(None)
            }
            None => {
                debug!(key, "Cache MISS");
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.remove(key);
        debug!(key, "Cache REMOVE");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Package repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredPackage {
    id: PackageId,
    name: String,
    weight: f64,
    content_value: f64,
    type_id: PackageTypeId,
    user_id: UserId,
    delivery_cost: Option<f64>,
    company_id: Option<CompanyId>,
    version: i64,
}

impl StoredPackage {
    fn matches(&self, user: UserId, filter: &PackageFilter) -> bool {
        self.user_id == user
            && filter.type_id.is_none_or(|type_id| self.type_id == type_id)
            && filter
                .delivery_cost_calculated
                .is_none_or(|calculated| self.delivery_cost.is_some() == calculated)
    }
}

#[derive(Default)]
struct PackageTables {
    users: BTreeMap<UserId, UserInfo>,
    types: BTreeMap<PackageTypeId, PackageType>,
    packages: BTreeMap<PackageId, StoredPackage>,
    next_package_id: i64,
}

impl PackageTables {
    fn info(&self, package: &StoredPackage) -> Option<PackageInfo> {
        let package_type = self.types.get(&package.type_id)?.clone();
        Some(PackageInfo {
            id: package.id,
            name: package.name.clone(),
            weight: package.weight,
            content_value: package.content_value,
            delivery_cost: package.delivery_cost,
            package_type,
        })
    }
}

/// [`PackageRepository`] held entirely in memory.
#[derive(Default)]
pub struct MemoryPackageRepository {
    tables: Mutex<PackageTables>,
}

impl MemoryPackageRepository {
    /// Create an empty repository with no package types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded with the default package types
    /// (ids 1, 2, 3 in [`DEFAULT_PACKAGE_TYPES`] order).
    pub fn with_default_types() -> Self {
        let mut tables = PackageTables::default();
        for (id, name) in (1..).zip(DEFAULT_PACKAGE_TYPES) {
            let id = PackageTypeId(id);
            tables.types.insert(
                id,
                PackageType {
                    id,
                    name: name.to_owned(),
                },
            );
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Optimistic version counter of a package, if it exists.
    pub async fn version(&self, package_id: PackageId) -> Option<i64> {
        self.tables
            .lock()
            .await
            .packages
            .get(&package_id)
            .map(|package| package.version)
    }

    /// Delivery cost of a package regardless of owner, if it exists.
    pub async fn delivery_cost(&self, package_id: PackageId) -> Option<Option<f64>> {
        self.tables
            .lock()
            .await
            .packages
            .get(&package_id)
            .map(|package| package.delivery_cost)
    }
}

#[async_trait]
impl PackageRepository for MemoryPackageRepository {
    async fn register_package(
        &self,
        user: UserId,
        package: &NewPackage,
    ) -> Result<PackageId, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.types.contains_key(&package.type_id) {
            return Err(RepositoryError::InvalidReference(format!(
                "package type {} does not exist",
                package.type_id
            )));
        }
        if !tables.users.contains_key(&user) {
            return Err(RepositoryError::InvalidReference(format!(
                "user {user} does not exist"
            )));
        }

        tables.next_package_id = tables.next_package_id.saturating_add(1);
        let id = PackageId(tables.next_package_id);
        tables.packages.insert(
            id,
            StoredPackage {
                id,
                name: package.name.clone(),
                weight: package.weight,
                content_value: package.content_value,
                type_id: package.type_id,
                user_id: user,
                delivery_cost: None,
                company_id: None,
                version: 0,
            },
        );
        Ok(id)
    }

    async fn package_types(&self) -> Result<Vec<PackageType>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut types: Vec<PackageType> = tables.types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn packages_for_user(
        &self,
        user: UserId,
        filter: &PackageFilter,
    ) -> Result<PackagePage, RepositoryError> {
        let tables = self.tables.lock().await;
        let matching: Vec<&StoredPackage> = tables
            .packages
            .values()
            .filter(|package| package.matches(user, filter))
            .collect();

        let total_items = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        let data = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|package| tables.info(package))
            .collect();

        Ok(PackagePage {
            page: filter.page(),
            page_size: filter.limit,
            total_items,
            data,
        })
    }

    async fn package(
        &self,
        user: UserId,
        package_id: PackageId,
    ) -> Result<Option<PackageInfo>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .packages
            .get(&package_id)
            .filter(|package| package.user_id == user)
            .and_then(|package| tables.info(package)))
    }

    async fn get_or_create_user(&self, user: UserId) -> Result<UserInfo, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let info = UserInfo {
            id: user,
            last_access_time: Some(Utc::now()),
        };
        tables.users.insert(user, info.clone());
        Ok(info)
    }

    async fn uncosted_packages(&self) -> Result<Vec<PackageToCalc>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .packages
            .values()
            .filter(|package| package.delivery_cost.is_none())
            .map(|package| PackageToCalc {
                id: package.id,
                package_type_id: package.type_id,
                name: package.name.clone(),
                weight: package.weight,
                content_value: package.content_value,
                delivery_cost: None,
            })
            .collect())
    }

    async fn update_delivery_costs(
        &self,
        packages: &[PackageToCalc],
    ) -> Result<Vec<PackageId>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let mut updated = Vec::new();
        for calc in packages {
            let Some(cost) = calc.delivery_cost else {
                continue;
            };
            if let Some(stored) = tables.packages.get_mut(&calc.id) {
                if stored.delivery_cost.is_none() {
                    stored.delivery_cost = Some(cost);
                    stored.version = stored.version.saturating_add(1);
                    updated.push(calc.id);
                }
            }
        }
        Ok(updated)
    }

    async fn assign_package(
        &self,
        package_id: PackageId,
        company_id: CompanyId,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .packages
            .get_mut(&package_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("package {package_id}")))?;

        if let Some(existing) = stored.company_id {
            return Err(RepositoryError::Conflict(format!(
                "package {package_id} is already assigned to company {existing}"
            )));
        }

        stored.company_id = Some(company_id);
        stored.version = stored.version.saturating_add(1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Calculation log
// ---------------------------------------------------------------------------

/// [`CalculationLogRepository`] backed by a `Vec`.
#[derive(Default)]
pub struct MemoryCalculationLog {
    entries: Mutex<Vec<CalculationLogEntry>>,
}

impl MemoryCalculationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every entry appended so far, in insertion order.
    pub async fn entries(&self) -> Vec<CalculationLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl CalculationLogRepository for MemoryCalculationLog {
    async fn add_entries(&self, entries: &[CalculationLogEntry]) -> Result<(), RepositoryError> {
        self.entries.lock().await.extend_from_slice(entries);
        Ok(())
    }

    async fn aggregated(&self, date: NaiveDate) -> Result<Vec<AggregatedCost>, RepositoryError> {
        let entries = self.entries.lock().await;
        let mut sums: BTreeMap<PackageTypeId, f64> = BTreeMap::new();
        for entry in entries.iter().filter(|entry| entry.date.date_naive() == date) {
            *sums.entry(entry.package_type_id).or_insert(0.0) += entry.delivery_cost;
        }

        Ok(sums
            .into_iter()
            .map(|(package_type_id, delivery_cost_sum)| AggregatedCost {
                package_type_id,
                date,
                delivery_cost_sum,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Rate source
// ---------------------------------------------------------------------------

/// [`RateSource`] serving a fixed table and counting fetches.
///
/// With no table set, every fetch fails as if the network were down.
#[derive(Default)]
pub struct MemoryRateSource {
    table: Mutex<Option<RateTable>>,
    fetches: AtomicUsize,
}

impl MemoryRateSource {
    /// A source that always answers with `table`.
    pub fn new(table: RateTable) -> Self {
        Self {
            table: Mutex::new(Some(table)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose every fetch fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Replace the served table; `None` makes fetches fail.
    pub async fn set_table(&self, table: Option<RateTable>) {
        *self.table.lock().await = table;
    }

    /// How many fetches have been attempted.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for MemoryRateSource {
    async fn fetch_daily_rates(&self) -> Result<RateTable, RateSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.table
            .lock()
            .await
            .clone()
            .ok_or_else(|| RateSourceError::Http("rate source unavailable".to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cache_entry_expires_after_ttl() {
        let cache = MemoryTemporaryStorage::new();
        cache
            .save("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn save_no_expiry_keeps_existing_ttl() {
        let cache = MemoryTemporaryStorage::new();
        cache
            .save("k", "old", Duration::from_secs(10))
            .await
            .unwrap();
        cache.save_no_expiry("k", "new").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn save_no_expiry_on_fresh_key_never_expires() {
        let cache = MemoryTemporaryStorage::new();
        cache.save_no_expiry("k", "v").await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400 * 30)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let cache = MemoryTemporaryStorage::new();
        cache.save_no_expiry("k", "v").await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        // Deleting again is fine.
        cache.delete("k").await.unwrap();
        assert!(cache.is_empty().await);
    }

    fn new_package(type_id: i32) -> NewPackage {
        NewPackage {
            name: String::from("Test Package"),
            weight: 1.5,
            content_value: 100.0,
            type_id: PackageTypeId(type_id),
        }
    }

    #[tokio::test]
    async fn register_requires_known_type_and_user() {
        let repo = MemoryPackageRepository::with_default_types();
        let user = UserId::new();

        let err = repo.register_package(user, &new_package(1)).await;
        assert!(matches!(err, Err(RepositoryError::InvalidReference(_))));

        repo.get_or_create_user(user).await.unwrap();
        let err = repo.register_package(user, &new_package(99)).await;
        assert!(matches!(err, Err(RepositoryError::InvalidReference(_))));

        let id = repo.register_package(user, &new_package(1)).await.unwrap();
        assert_eq!(id, PackageId(1));
        assert_eq!(repo.version(id).await, Some(0));
    }

    #[tokio::test]
    async fn package_types_are_sorted_by_name() {
        let repo = MemoryPackageRepository::with_default_types();
        let names: Vec<String> = repo
            .package_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["clothing", "electronics", "miscellaneous"]);
    }

    #[tokio::test]
    async fn update_only_touches_uncosted_packages() {
        let repo = MemoryPackageRepository::with_default_types();
        let user = UserId::new();
        repo.get_or_create_user(user).await.unwrap();
        let id = repo.register_package(user, &new_package(1)).await.unwrap();

        let mut pending = repo.uncosted_packages().await.unwrap();
        assert_eq!(pending.len(), 1);
        pending[0].delivery_cost = Some(10.0);
        assert_eq!(repo.update_delivery_costs(&pending).await.unwrap(), [id]);

        // A second write of a different value is ignored.
        pending[0].delivery_cost = Some(99.0);
        assert!(repo.update_delivery_costs(&pending).await.unwrap().is_empty());
        let cost = repo.delivery_cost(id).await.flatten().unwrap();
        assert!((cost - 10.0).abs() < 1e-9);
        assert_eq!(repo.version(id).await, Some(1));
        assert!(repo.uncosted_packages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn packages_for_user_filters_and_pages() {
        let repo = MemoryPackageRepository::with_default_types();
        let owner = UserId::new();
        let other = UserId::new();
        repo.get_or_create_user(owner).await.unwrap();
        repo.get_or_create_user(other).await.unwrap();
        for type_id in [1, 2, 1] {
            repo.register_package(owner, &new_package(type_id))
                .await
                .unwrap();
        }
        repo.register_package(other, &new_package(1)).await.unwrap();

        let filter = PackageFilter {
            type_id: Some(PackageTypeId(1)),
            delivery_cost_calculated: Some(false),
            offset: 1,
            limit: 1,
        };
        let page = repo.packages_for_user(owner, &filter).await.unwrap();
        assert_eq!(page.total_items, 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, PackageId(3));

        let costed = PackageFilter {
            delivery_cost_calculated: Some(true),
            ..filter
        };
        let page = repo.packages_for_user(owner, &costed).await.unwrap();
        assert_eq!(page.total_items, 0);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn package_is_private_to_owner() {
        let repo = MemoryPackageRepository::with_default_types();
        let owner = UserId::new();
        repo.get_or_create_user(owner).await.unwrap();
        let id = repo.register_package(owner, &new_package(2)).await.unwrap();

        let info = repo.package(owner, id).await.unwrap().unwrap();
        assert_eq!(info.package_type.name, "electronics");
        assert!(repo.package(UserId::new(), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn assign_is_first_writer_wins() {
        let repo = MemoryPackageRepository::with_default_types();
        let owner = UserId::new();
        repo.get_or_create_user(owner).await.unwrap();
        let id = repo.register_package(owner, &new_package(1)).await.unwrap();

        repo.assign_package(id, CompanyId(7)).await.unwrap();
        assert_eq!(repo.version(id).await, Some(1));
        assert!(matches!(
            repo.assign_package(id, CompanyId(8)).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            repo.assign_package(PackageId(404), CompanyId(7)).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rate_source_counts_fetches_and_fails_without_table() {
        let source = MemoryRateSource::unavailable();
        assert!(source.fetch_daily_rates().await.is_err());

        source
            .set_table(Some(RateTable::from_pairs([("USD", 90.0)])))
            .await;
        let table = source.fetch_daily_rates().await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn aggregation_groups_by_type_within_day() {
        let log = MemoryCalculationLog::new();
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();
        let entry = |package: i64, type_id: i32, cost: f64, date| CalculationLogEntry {
            package_id: PackageId(package),
            package_type_id: PackageTypeId(type_id),
            delivery_cost: cost,
            date,
        };
        log.add_entries(&[
            entry(1, 1, 157.5, at(3, 0)),
            entry(2, 1, 42.5, at(3, 23)),
            entry(3, 2, 10.0, at(3, 12)),
            entry(4, 1, 1000.0, at(4, 0)),
        ])
        .await
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let rows = log.aggregated(day).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].package_type_id, PackageTypeId(1));
        assert!((rows[0].delivery_cost_sum - 200.0).abs() < 1e-9);
        assert_eq!(rows[1].package_type_id, PackageTypeId(2));
        assert_eq!(rows[1].date, day);

        let empty = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(log.aggregated(empty).await.unwrap().is_empty());
    }
}
