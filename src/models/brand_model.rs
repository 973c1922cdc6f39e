//! Brand models (`brandmodel`), served over HTTP as `brandasset`.

use super::{column, contains, expect_deleted, filter_by, list_page, merge, merge_opt, query_opt};
use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::pool::DbPool;
use crate::validator::Validator;
use chrono::{DateTime, Utc};
use may_postgres::Row;
use sea_query::{Expr, JoinType, Query, SelectStatement};
use serde::{Deserialize, Serialize};

pub const SORT_COLUMNS: SortColumns = SortColumns(&[
    ("id", "brandmodel.id"),
    ("created_at", "brandmodel.created_at"),
    ("name", "brandmodel.name"),
]);

const SELECT_COLUMNS: &[&str] = &[
    "brandmodel.id",
    "brandmodel.created_at",
    "brandmodel.modified_at",
    "brandmodel.name",
    "brandmodel.ket",
    "brandmodel.version",
    "brandmodel.brand_id",
    "brand.name AS brandname",
];

const GET_SQL: &str = "SELECT brandmodel.id, brandmodel.created_at, brandmodel.modified_at, brandmodel.name,
        brandmodel.ket, brandmodel.version, brandmodel.brand_id, brand.name AS brandname
     FROM brandmodel
     LEFT JOIN brand ON brand.id = brandmodel.brand_id
     WHERE brandmodel.id = $1";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BrandModel {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub name: String,
    pub ket: Option<String>,
    pub version: i32,
    pub brand_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brandname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrandModelInput {
    pub name: Option<String>,
    pub ket: Option<String>,
    pub brand_id: Option<i64>,
    pub version: Option<i32>,
}

impl BrandModel {
    pub fn from_input(input: BrandModelInput) -> Self {
        let mut model = Self::default();
        model.apply(input);
        model
    }

    pub fn apply(&mut self, input: BrandModelInput) {
        merge(&mut self.name, input.name);
        merge_opt(&mut self.ket, input.ket);
        merge(&mut self.brand_id, input.brand_id);
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
            brand_id: column(row, "brand_id")?,
            brandname: column(row, "brandname")?,
        })
    }
}

pub fn validate_brand_model(v: &mut Validator, model: &BrandModel) {
    v.check(!model.name.trim().is_empty(), "name", "must be provided");
    v.check(model.brand_id > 0, "brand_id", "must be provided");
}

/// List filters: `name`, `ket` and `brandname`.
#[derive(Debug, Clone, Default)]
pub struct BrandModelQuery {
    pub name: String,
    pub ket: String,
    pub brandname: String,
}

fn list_base(query: &BrandModelQuery) -> SelectStatement {
    let mut base = Query::select();
    base.from("brandmodel").join(
        JoinType::LeftJoin,
        "brand",
        Expr::cust("brand.id = brandmodel.brand_id"),
    );
    filter_by(
        &mut base,
        [
            contains("brandmodel.name", &query.name),
            contains("brandmodel.ket", &query.ket),
            contains("brand.name", &query.brandname),
        ],
    );
    base
}

#[derive(Clone)]
pub struct BrandModelStore {
    pool: DbPool,
}

impl BrandModelStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, model: &mut BrandModel) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = conn.query_one(
            "INSERT INTO brandmodel (name, ket, brand_id)
             VALUES ($1, $2, $3)
             RETURNING id, created_at, version",
            &[&model.name, &model.ket, &model.brand_id],
        )?;
        model.id = column(&row, "id")?;
        model.created_at = column(&row, "created_at")?;
        model.version = column(&row, "version")?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> StoreResult<BrandModel> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        let row = query_opt(&conn, GET_SQL, &[&id])?.ok_or(StoreError::NotFound)?;
        BrandModel::from_row(&row)
    }

    pub fn update(&self, model: &mut BrandModel) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "UPDATE brandmodel
             SET name = $1, ket = $2, brand_id = $3, modified_at = now(), version = version + 1
             WHERE id = $4 AND version = $5
             RETURNING version, modified_at",
            &[&model.name, &model.ket, &model.brand_id, &model.id, &model.version],
        )?
        .ok_or(StoreError::EditConflict)?;
        model.version = column(&row, "version")?;
        model.modified_at = column(&row, "modified_at")?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        expect_deleted(conn.execute("DELETE FROM brandmodel WHERE id = $1", &[&id])?)
    }

    pub fn list(
        &self,
        query: &BrandModelQuery,
        filters: &Filters,
    ) -> StoreResult<(Vec<BrandModel>, Metadata)> {
        let conn = self.pool.acquire()?;
        list_page(
            &conn,
            &list_base(query),
            SELECT_COLUMNS,
            &SORT_COLUMNS,
            filters,
            BrandModel::from_row,
        )
    }
}
