//! `PostgreSQL` calculation log.
//!
//! The `calculation_log` table is append-only: one row per package costed
//! by the calculation job. Aggregation sums `delivery_cost` per package type
//! over one UTC day. The secondary indexes it relies on are created lazily
//! on the first aggregation and the statement is safe to repeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use parcel_core::{CalculationLogRepository, RepositoryError};
use parcel_types::{AggregatedCost, CalculationLogEntry, PackageTypeId};
use sqlx::PgPool;

use crate::error::DbError;

/// Indexes backing the daily aggregation.
const INDEXES: &[&str] = &[
    r"CREATE INDEX IF NOT EXISTS calculation_log_package_type_id_idx
      ON calculation_log (package_type_id)",
    r"CREATE INDEX IF NOT EXISTS calculation_log_date_idx ON calculation_log (date)",
];

/// Calculation log over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgCalculationLog {
    pool: PgPool,
    indexes_ready: Arc<AtomicBool>,
}

impl PgCalculationLog {
    /// Create a log over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            indexes_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create the aggregation indexes if this process has not yet done so.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if index creation fails.
    pub async fn ensure_indexes(&self) -> Result<(), DbError> {
        if self.indexes_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        for statement in INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        self.indexes_ready.store(true, Ordering::Release);
        tracing::debug!("Calculation log indexes ensured");
        Ok(())
    }

    async fn insert_entries(&self, entries: &[CalculationLogEntry]) -> Result<(), DbError> {
        if entries.is_empty() {
            return Ok(());
        }

        let len = entries.len();
        let mut package_ids = Vec::with_capacity(len);
        let mut type_ids = Vec::with_capacity(len);
        let mut costs = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        for entry in entries {
            package_ids.push(entry.package_id.into_inner());
            type_ids.push(entry.package_type_id.into_inner());
            costs.push(entry.delivery_cost);
            dates.push(entry.date);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"INSERT INTO calculation_log (package_id, package_type_id, delivery_cost, date)
              SELECT * FROM UNNEST($1::BIGINT[], $2::INTEGER[], $3::DOUBLE PRECISION[], $4::TIMESTAMPTZ[])",
        )
        .bind(&package_ids)
        .bind(&type_ids)
        .bind(&costs)
        .bind(&dates)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(count = len, "Inserted calculation log entries (batch UNNEST)");
        Ok(())
    }

    async fn sum_by_type(&self, date: NaiveDate) -> Result<Vec<AggregateRow>, DbError> {
        self.ensure_indexes().await?;

        let (start, end) = day_bounds(date)?;
        let rows = sqlx::query_as::<_, AggregateRow>(
            r"SELECT package_type_id,
                     (date AT TIME ZONE 'UTC')::DATE AS day,
                     SUM(delivery_cost) AS delivery_cost_sum
              FROM calculation_log
              WHERE date >= $1 AND date < $2
              GROUP BY package_type_id, day
              ORDER BY package_type_id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// `[date 00:00, date+1 00:00)` in UTC.
fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), DbError> {
    let next = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| DbError::Config(format!("date {date} is out of range")))?;
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = next.and_time(chrono::NaiveTime::MIN).and_utc();
    Ok((start, end))
}

#[async_trait]
impl CalculationLogRepository for PgCalculationLog {
    async fn add_entries(&self, entries: &[CalculationLogEntry]) -> Result<(), RepositoryError> {
        Ok(self.insert_entries(entries).await?)
    }

    async fn aggregated(&self, date: NaiveDate) -> Result<Vec<AggregatedCost>, RepositoryError> {
        let rows = self.sum_by_type(date).await?;
        Ok(rows
            .into_iter()
            .map(|row| AggregatedCost {
                package_type_id: PackageTypeId(row.package_type_id),
                date: row.day,
                delivery_cost_sum: row.delivery_cost_sum,
            })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AggregateRow {
    package_type_id: i32,
    day: NaiveDate,
    delivery_cost_sum: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn day_bounds_cover_one_utc_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let (start, end) = day_bounds(date).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn day_bounds_reject_last_representable_date() {
        assert!(day_bounds(NaiveDate::MAX).is_err());
    }
}
