//! Brands that stock items are classified by.

use super::{column, contains, expect_deleted, filter_by, list_page, merge, merge_opt, query_opt};
use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::pool::DbPool;
use crate::validator::Validator;
use chrono::{DateTime, Utc};
use may_postgres::Row;
use sea_query::{Query, SelectStatement};
use serde::{Deserialize, Serialize};

pub const SORT_COLUMNS: SortColumns = SortColumns(&[
    ("id", "brand.id"),
    ("created_at", "brand.created_at"),
    ("name", "brand.name"),
]);

const SELECT_COLUMNS: &[&str] = &[
    "brand.id",
    "brand.created_at",
    "brand.modified_at",
    "brand.name",
    "brand.ket",
    "brand.version",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Brand {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub name: String,
    pub ket: Option<String>,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrandInput {
    pub name: Option<String>,
    pub ket: Option<String>,
    pub version: Option<i32>,
}

impl Brand {
    pub fn from_input(input: BrandInput) -> Self {
        let mut brand = Self::default();
        brand.apply(input);
        brand
    }

    pub fn apply(&mut self, input: BrandInput) {
        merge(&mut self.name, input.name);
        merge_opt(&mut self.ket, input.ket);
        merge(&mut self.version, input.version);
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: column(row, "id")?,
            created_at: column(row, "created_at")?,
            modified_at: column(row, "modified_at")?,
            name: column(row, "name")?,
            ket: column(row, "ket")?,
            version: column(row, "version")?,
        })
    }
}

pub fn validate_brand(v: &mut Validator, brand: &Brand) {
    v.check(!brand.name.trim().is_empty(), "name", "must be provided");
}

/// List filters: `name` and `ket`.
#[derive(Debug, Clone, Default)]
pub struct BrandQuery {
    pub name: String,
    pub ket: String,
}

fn list_base(query: &BrandQuery) -> SelectStatement {
    let mut base = Query::select();
    base.from("brand");
    filter_by(
        &mut base,
        [
            contains("brand.name", &query.name),
            contains("brand.ket", &query.ket),
        ],
    );
    base
}

#[derive(Clone)]
pub struct BrandStore {
    pool: DbPool,
}

impl BrandStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, brand: &mut Brand) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = conn.query_one(
            "INSERT INTO brand (name, ket) VALUES ($1, $2) RETURNING id, created_at, version",
            &[&brand.name, &brand.ket],
        )?;
        brand.id = column(&row, "id")?;
        brand.created_at = column(&row, "created_at")?;
        brand.version = column(&row, "version")?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> StoreResult<Brand> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "SELECT id, created_at, modified_at, name, ket, version FROM brand WHERE id = $1",
            &[&id],
        )?
        .ok_or(StoreError::NotFound)?;
        Brand::from_row(&row)
    }

    pub fn update(&self, brand: &mut Brand) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "UPDATE brand
             SET name = $1, ket = $2, modified_at = now(), version = version + 1
             WHERE id = $3 AND version = $4
             RETURNING version, modified_at",
            &[&brand.name, &brand.ket, &brand.id, &brand.version],
        )?
        .ok_or(StoreError::EditConflict)?;
        brand.version = column(&row, "version")?;
        brand.modified_at = column(&row, "modified_at")?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        expect_deleted(conn.execute("DELETE FROM brand WHERE id = $1", &[&id])?)
    }

    pub fn list(&self, query: &BrandQuery, filters: &Filters) -> StoreResult<(Vec<Brand>, Metadata)> {
        let conn = self.pool.acquire()?;
        list_page(
            &conn,
            &list_base(query),
            SELECT_COLUMNS,
            &SORT_COLUMNS,
            filters,
            Brand::from_row,
        )
    }
}
