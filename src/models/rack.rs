//! Storage racks (`rak`) inside a warehouse.

use super::{column, contains, expect_deleted, filter_by, list_page, merge, merge_opt, query_opt};
use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::pool::DbPool;
use crate::validator::Validator;
use crate::value_conversion::with_converted_params;
use chrono::{DateTime, Utc};
use may_postgres::Row;
use sea_query::{Expr, InsertStatement, JoinType, PostgresQueryBuilder, Query, SelectStatement};
use serde::{Deserialize, Serialize};

/// Most racks one bulk insert may carry.
pub const MAX_BULK_RACKS: usize = 1000;

pub const SORT_COLUMNS: SortColumns = SortColumns(&[
    ("id", "rak.rak_id"),
    ("created_at", "rak.created_at"),
    ("rak_code", "rak.rak_code"),
]);

const SELECT_COLUMNS: &[&str] = &[
    "rak.rak_id",
    "rak.created_at",
    "rak.modified_at",
    "rak.rak_code",
    "rak.rak_ket",
    "rak.version",
    "rak.user_modified",
    "rak.warehouse_id",
    "warehouse.name_warehouse",
];

const GET_SQL: &str = "SELECT rak.rak_id, rak.created_at, rak.modified_at, rak.rak_code, rak.rak_ket,
        rak.version, rak.user_modified, rak.warehouse_id, warehouse.name_warehouse
     FROM rak
     LEFT JOIN warehouse ON warehouse.warehouse_id = rak.warehouse_id
     WHERE rak.rak_id = $1";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rack {
    pub rak_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub rak_code: String,
    pub rak_ket: Option<String>,
    pub version: i32,
    pub user_modified: Option<String>,
    pub warehouse_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_warehouse: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RackInput {
    pub rak_code: Option<String>,
    pub rak_ket: Option<String>,
    pub warehouse_id: Option<i64>,
    pub user_modified: Option<String>,
    pub version: Option<i32>,
}

impl Rack {
    pub fn from_input(input: RackInput) -> Self {
        let mut rack = Self::default();
        rack.apply(input);
        rack
    }

    pub fn apply(&mut self, input: RackInput) {
        merge(&mut self.rak_code, input.rak_code);
        merge_opt(&mut self.rak_ket, input.rak_ket);
        merge(&mut self.warehouse_id, input.warehouse_id);
        merge_opt(&mut self.user_modified, input.user_modified);
        merge(&mut self.version, input.version);
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            rak_id: column(row, "rak_id")?,
            created_at: column(row, "created_at")?,
            modified_at: column(row, "modified_at")?,
            rak_code: column(row, "rak_code")?,
            rak_ket: column(row, "rak_ket")?,
            version: column(row, "version")?,
            user_modified: column(row, "user_modified")?,
            warehouse_id: column(row, "warehouse_id")?,
            name_warehouse: column(row, "name_warehouse")?,
        })
    }
}

pub fn validate_rack(v: &mut Validator, rack: &Rack) {
    v.check(!rack.rak_code.trim().is_empty(), "rak_code", "must be provided");
    v.check(rack.warehouse_id > 0, "warehouse_id", "must be provided");
}

/// Validates every rack of a bulk insert; errors are keyed `[i].field`.
pub fn validate_racks(v: &mut Validator, racks: &[Rack]) {
    v.check(!racks.is_empty(), "rak", "must contain at least one rack");
    v.check(
        racks.len() <= MAX_BULK_RACKS,
        "rak",
        &format!("must not contain more than {} racks", MAX_BULK_RACKS),
    );
    for (i, rack) in racks.iter().enumerate() {
        let mut one = Validator::new();
        validate_rack(&mut one, rack);
        for (field, message) in one.into_errors() {
            v.add_error(format!("[{}].{}", i, field), message);
        }
    }
}

/// List filters: `code`, `warehousename` and `ket`.
#[derive(Debug, Clone, Default)]
pub struct RackQuery {
    pub code: String,
    pub warehousename: String,
    pub ket: String,
}

fn list_base(query: &RackQuery) -> SelectStatement {
    let mut base = Query::select();
    base.from("rak").join(
        JoinType::LeftJoin,
        "warehouse",
        Expr::cust("warehouse.warehouse_id = rak.warehouse_id"),
    );
    filter_by(
        &mut base,
        [
            contains("rak.rak_code", &query.code),
            contains("warehouse.name_warehouse", &query.warehousename),
            contains("rak.rak_ket", &query.ket),
        ],
    );
    base
}

/// One multi-row `INSERT ... VALUES (..), (..)` for all racks.
fn bulk_insert_statement(racks: &[Rack]) -> StoreResult<InsertStatement> {
    let mut insert = Query::insert();
    insert
        .into_table("rak")
        .columns(["rak_code", "rak_ket", "warehouse_id", "user_modified"])
        .returning(Query::returning().columns(["rak_id", "created_at", "version"]));
    for rack in racks {
        insert
            .values([
                rack.rak_code.clone().into(),
                rack.rak_ket.clone().into(),
                rack.warehouse_id.into(),
                rack.user_modified.clone().into(),
            ])
            .map_err(|e| StoreError::Database(e.into()))?;
    }
    Ok(insert)
}

#[derive(Clone)]
pub struct RackStore {
    pool: DbPool,
}

impl RackStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, rack: &mut Rack) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = conn.query_one(
            "INSERT INTO rak (rak_code, rak_ket, warehouse_id, user_modified)
             VALUES ($1, $2, $3, $4)
             RETURNING rak_id, created_at, version",
            &[
                &rack.rak_code,
                &rack.rak_ket,
                &rack.warehouse_id,
                &rack.user_modified,
            ],
        )?;
        rack.rak_id = column(&row, "rak_id")?;
        rack.created_at = column(&row, "created_at")?;
        rack.version = column(&row, "version")?;
        Ok(())
    }

    /// Inserts all racks in a single statement; either all rows land or none.
    pub fn insert_many(&self, racks: &mut [Rack]) -> StoreResult<()> {
        if racks.is_empty() {
            return Ok(());
        }
        let (sql, values) = bulk_insert_statement(racks)?.build(PostgresQueryBuilder);

        let conn = self.pool.acquire()?;
        let rows = with_converted_params(&values, |params| conn.query_all(&sql, params))?;
        if rows.len() != racks.len() {
            return Err(StoreError::Decode(format!(
                "bulk insert returned {} rows for {} racks",
                rows.len(),
                racks.len()
            )));
        }
        for (rack, row) in racks.iter_mut().zip(&rows) {
            rack.rak_id = column(row, "rak_id")?;
            rack.created_at = column(row, "created_at")?;
            rack.version = column(row, "version")?;
        }
        log::debug!("inserted {} racks", racks.len());
        Ok(())
    }

    pub fn get(&self, id: i64) -> StoreResult<Rack> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        let row = query_opt(&conn, GET_SQL, &[&id])?.ok_or(StoreError::NotFound)?;
        Rack::from_row(&row)
    }

    pub fn update(&self, rack: &mut Rack) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "UPDATE rak
             SET rak_code = $1, rak_ket = $2, warehouse_id = $3, user_modified = $4,
                 modified_at = now(), version = version + 1
             WHERE rak_id = $5 AND version = $6
             RETURNING version, modified_at",
            &[
                &rack.rak_code,
                &rack.rak_ket,
                &rack.warehouse_id,
                &rack.user_modified,
                &rack.rak_id,
                &rack.version,
            ],
        )?
        .ok_or(StoreError::EditConflict)?;
        rack.version = column(&row, "version")?;
        rack.modified_at = column(&row, "modified_at")?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        expect_deleted(conn.execute("DELETE FROM rak WHERE rak_id = $1", &[&id])?)
    }

    pub fn list(&self, query: &RackQuery, filters: &Filters) -> StoreResult<(Vec<Rack>, Metadata)> {
        let conn = self.pool.acquire()?;
        list_page(
            &conn,
            &list_base(query),
            SELECT_COLUMNS,
            &SORT_COLUMNS,
            filters,
            Rack::from_row,
        )
    }
}
