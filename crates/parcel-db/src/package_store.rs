//! `PostgreSQL` package repository.
//!
//! Owns the `packages`, `package_types`, and `users` tables. The bulk cost
//! update runs in one transaction and only touches rows whose
//! `delivery_cost` is still null, so a cost is written at most once even if
//! two runs race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcel_core::{PackageRepository, RepositoryError};
use parcel_types::{
    CompanyId, NewPackage, PackageFilter, PackageId, PackageInfo, PackagePage, PackageToCalc,
    PackageType, PackageTypeId, UserId, UserInfo,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Columns selected for a [`PackageRow`].
const PACKAGE_COLUMNS: &str = r"p.id, p.name, p.weight, p.content_value, p.delivery_cost,
    p.type_id, t.name AS type_name";

/// Package repository over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgPackageRepository {
    pool: PgPool,
}

impl PgPackageRepository {
    /// Create a repository over `pool`.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_package(&self, user: UserId, package: &NewPackage) -> Result<i64, DbError> {
        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO packages (name, weight, content_value, type_id, user_id)
              VALUES ($1, $2, $3, $4, $5)
              RETURNING id",
        )
        .bind(&package.name)
        .bind(package.weight)
        .bind(package.content_value)
        .bind(package.type_id.into_inner())
        .bind(user.into_inner())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn fetch_page(&self, user: UserId, filter: &PackageFilter) -> Result<PackagePage, DbError> {
        let user_id = user.into_inner();
        let type_id = filter.type_id.map(PackageTypeId::into_inner);

        let total: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM packages p
              WHERE p.user_id = $1
                AND ($2::INTEGER IS NULL OR p.type_id = $2)
                AND ($3::BOOLEAN IS NULL OR (p.delivery_cost IS NOT NULL) = $3)",
        )
        .bind(user_id)
        .bind(type_id)
        .bind(filter.delivery_cost_calculated)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PackageRow>(&format!(
            r"SELECT {PACKAGE_COLUMNS}
              FROM packages p JOIN package_types t ON t.id = p.type_id
              WHERE p.user_id = $1
                AND ($2::INTEGER IS NULL OR p.type_id = $2)
                AND ($3::BOOLEAN IS NULL OR (p.delivery_cost IS NOT NULL) = $3)
              ORDER BY p.id
              OFFSET $4 LIMIT $5"
        ))
        .bind(user_id)
        .bind(type_id)
        .bind(filter.delivery_cost_calculated)
        .bind(i64::from(filter.offset))
        .bind(i64::from(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(PackagePage {
            page: filter.page(),
            page_size: filter.limit,
            total_items: u64::try_from(total).unwrap_or(0),
            data: rows.into_iter().map(PackageRow::into_info).collect(),
        })
    }

    async fn fetch_package(
        &self,
        user: UserId,
        package_id: PackageId,
    ) -> Result<Option<PackageInfo>, DbError> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            r"SELECT {PACKAGE_COLUMNS}
              FROM packages p JOIN package_types t ON t.id = p.type_id
              WHERE p.id = $1 AND p.user_id = $2"
        ))
        .bind(package_id.into_inner())
        .bind(user.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PackageRow::into_info))
    }

    async fn upsert_user(&self, user: UserId) -> Result<UserRow, DbError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"INSERT INTO users (id, last_access_time) VALUES ($1, now())
              ON CONFLICT (id) DO UPDATE SET last_access_time = EXCLUDED.last_access_time
              RETURNING id, last_access_time",
        )
        .bind(user.into_inner())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn select_uncosted(&self) -> Result<Vec<CalcRow>, DbError> {
        let rows = sqlx::query_as::<_, CalcRow>(
            r"SELECT id, type_id, name, weight, content_value, delivery_cost
              FROM packages
              WHERE delivery_cost IS NULL
              ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn bulk_update_costs(
        &self,
        packages: &[PackageToCalc],
    ) -> Result<Vec<PackageId>, DbError> {
        let (ids, costs): (Vec<i64>, Vec<f64>) = packages
            .iter()
            .filter_map(|p| p.delivery_cost.map(|cost| (p.id.into_inner(), cost)))
            .unzip();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let updated: Vec<(i64,)> = sqlx::query_as(
            r"UPDATE packages AS p
              SET delivery_cost = u.cost, version = p.version + 1
              FROM UNNEST($1::BIGINT[], $2::DOUBLE PRECISION[]) AS u(id, cost)
              WHERE p.id = u.id AND p.delivery_cost IS NULL
              RETURNING p.id",
        )
        .bind(&ids)
        .bind(&costs)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(
            selected = ids.len(),
            updated = updated.len(),
            "Updated delivery costs (batch UNNEST)"
        );
        Ok(updated.into_iter().map(|(id,)| PackageId(id)).collect())
    }

    async fn try_assign(
        &self,
        package_id: PackageId,
        company_id: CompanyId,
    ) -> Result<Result<(), RepositoryError>, DbError> {
        let current: Option<(i64, Option<i64>)> =
            sqlx::query_as(r"SELECT version, company_id FROM packages WHERE id = $1")
                .bind(package_id.into_inner())
                .fetch_optional(&self.pool)
                .await?;

        let Some((version, assigned)) = current else {
            return Ok(Err(RepositoryError::NotFound(format!("package {package_id}"))));
        };
        if let Some(existing) = assigned {
            return Ok(Err(RepositoryError::Conflict(format!(
                "package {package_id} is already assigned to company {existing}"
            ))));
        }

        let updated = sqlx::query(
            r"UPDATE packages SET company_id = $2, version = version + 1
              WHERE id = $1 AND version = $3 AND company_id IS NULL",
        )
        .bind(package_id.into_inner())
        .bind(company_id.into_inner())
        .bind(version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(Err(RepositoryError::Conflict(format!(
                "package {package_id} changed concurrently (version {version})"
            ))));
        }
        Ok(Ok(()))
    }
}

#[async_trait]
impl PackageRepository for PgPackageRepository {
    async fn register_package(
        &self,
        user: UserId,
        package: &NewPackage,
    ) -> Result<PackageId, RepositoryError> {
        let id = self.insert_package(user, package).await?;
        Ok(PackageId(id))
    }

    async fn package_types(&self) -> Result<Vec<PackageType>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i32, String)>(
            r"SELECT id, name FROM package_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| PackageType {
                id: PackageTypeId(id),
                name,
            })
            .collect())
    }

    async fn packages_for_user(
        &self,
        user: UserId,
        filter: &PackageFilter,
    ) -> Result<PackagePage, RepositoryError> {
        Ok(self.fetch_page(user, filter).await?)
    }

    async fn package(
        &self,
        user: UserId,
        package_id: PackageId,
    ) -> Result<Option<PackageInfo>, RepositoryError> {
        Ok(self.fetch_package(user, package_id).await?)
    }

    async fn get_or_create_user(&self, user: UserId) -> Result<UserInfo, RepositoryError> {
        let row = self.upsert_user(user).await?;
        Ok(UserInfo {
            id: UserId(row.id),
            last_access_time: row.last_access_time,
        })
    }

    async fn uncosted_packages(&self) -> Result<Vec<PackageToCalc>, RepositoryError> {
        let rows = self.select_uncosted().await?;
        Ok(rows.into_iter().map(CalcRow::into_calc).collect())
    }

    async fn update_delivery_costs(
        &self,
        packages: &[PackageToCalc],
    ) -> Result<Vec<PackageId>, RepositoryError> {
        Ok(self.bulk_update_costs(packages).await?)
    }

    async fn assign_package(
        &self,
        package_id: PackageId,
        company_id: CompanyId,
    ) -> Result<(), RepositoryError> {
        self.try_assign(package_id, company_id).await?
    }
}

/// A package joined with its type.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PackageRow {
    id: i64,
    name: String,
    weight: f64,
    content_value: f64,
    delivery_cost: Option<f64>,
    type_id: i32,
    type_name: String,
}

impl PackageRow {
    fn into_info(self) -> PackageInfo {
        PackageInfo {
            id: PackageId(self.id),
            name: self.name,
            weight: self.weight,
            content_value: self.content_value,
            delivery_cost: self.delivery_cost,
            package_type: PackageType {
                id: PackageTypeId(self.type_id),
                name: self.type_name,
            },
        }
    }
}

/// The columns the calculation job needs.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CalcRow {
    id: i64,
    type_id: i32,
    name: String,
    weight: f64,
    content_value: f64,
    delivery_cost: Option<f64>,
}

impl CalcRow {
    fn into_calc(self) -> PackageToCalc {
        PackageToCalc {
            id: PackageId(self.id),
            package_type_id: PackageTypeId(self.type_id),
            name: self.name,
            weight: self.weight,
            content_value: self.content_value,
            delivery_cost: self.delivery_cost,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    last_access_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_row_maps_type_name() {
        let info = PackageRow {
            id: 9,
            name: "box".to_owned(),
            weight: 1.5,
            content_value: 100.0,
            delivery_cost: None,
            type_id: 2,
            type_name: "electronics".to_owned(),
        }
        .into_info();
        assert_eq!(info.id, PackageId(9));
        assert_eq!(info.package_type.id, PackageTypeId(2));
        assert_eq!(info.package_type.name, "electronics");
        assert!(info.delivery_cost.is_none());
    }

    #[test]
    fn calc_row_keeps_type_id() {
        let calc = CalcRow {
            id: 4,
            type_id: 3,
            name: "crate".to_owned(),
            weight: 2.0,
            content_value: 10.0,
            delivery_cost: None,
        }
        .into_calc();
        assert_eq!(calc.package_type_id, PackageTypeId(3));
        assert_eq!(calc.id, PackageId(4));
    }
}
