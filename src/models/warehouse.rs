//! Warehouses, each owned by one company.

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
    ("id", "warehouse.warehouse_id"),
    ("created_at", "warehouse.created_at"),
    ("name_warehouse", "warehouse.name_warehouse"),
]);

const SELECT_COLUMNS: &[&str] = &[
    "warehouse.warehouse_id",
    "warehouse.perusahaan_id",
    "perusahaan.name AS name_perusahaan",
    "warehouse.name_warehouse",
    "warehouse.address_warehouse",
    "warehouse.tlp_warehouse",
    "warehouse.ket_warehouse",
    "warehouse.user_modified",
    "warehouse.created_at",
    "warehouse.modified_at",
    "warehouse.version",
];

const GET_SQL: &str = "SELECT warehouse.warehouse_id, warehouse.perusahaan_id, perusahaan.name AS name_perusahaan,
        warehouse.name_warehouse, warehouse.address_warehouse, warehouse.tlp_warehouse,
        warehouse.ket_warehouse, warehouse.user_modified, warehouse.created_at,
        warehouse.modified_at, warehouse.version
     FROM warehouse
     LEFT JOIN perusahaan ON perusahaan.id = warehouse.perusahaan_id
     WHERE warehouse.warehouse_id = $1";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Warehouse {
    pub warehouse_id: i64,
    pub perusahaan_id: i64,
    pub name_perusahaan: Option<String>,
    pub name_warehouse: String,
    pub address_warehouse: Option<String>,
    pub tlp_warehouse: Option<String>,
    pub ket_warehouse: Option<String>,
    pub user_modified: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseInput {
    pub perusahaan_id: Option<i64>,
    pub name_warehouse: Option<String>,
    pub address_warehouse: Option<String>,
    pub tlp_warehouse: Option<String>,
    pub ket_warehouse: Option<String>,
    pub user_modified: Option<String>,
    pub version: Option<i32>,
}

impl Warehouse {
    pub fn from_input(input: WarehouseInput) -> Self {
        let mut warehouse = Self::default();
        warehouse.apply(input);
        warehouse
    }

    pub fn apply(&mut self, input: WarehouseInput) {
        merge(&mut self.perusahaan_id, input.perusahaan_id);
        merge(&mut self.name_warehouse, input.name_warehouse);
        merge_opt(&mut self.address_warehouse, input.address_warehouse);
        merge_opt(&mut self.tlp_warehouse, input.tlp_warehouse);
        merge_opt(&mut self.ket_warehouse, input.ket_warehouse);
        merge_opt(&mut self.user_modified, input.user_modified);
        merge(&mut self.version, input.version);
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            warehouse_id: column(row, "warehouse_id")?,
            perusahaan_id: column(row, "perusahaan_id")?,
            name_perusahaan: column(row, "name_perusahaan")?,
            name_warehouse: column(row, "name_warehouse")?,
            address_warehouse: column(row, "address_warehouse")?,
            tlp_warehouse: column(row, "tlp_warehouse")?,
            ket_warehouse: column(row, "ket_warehouse")?,
            user_modified: column(row, "user_modified")?,
            created_at: column(row, "created_at")?,
            modified_at: column(row, "modified_at")?,
            version: column(row, "version")?,
        })
    }
}

pub fn validate_warehouse(v: &mut Validator, warehouse: &Warehouse) {
    v.check(
        !warehouse.name_warehouse.trim().is_empty(),
        "name_warehouse",
        "must be provided",
    );
    v.check(warehouse.perusahaan_id > 0, "perusahaan_id", "must be provided");
}

/// List filters: `name` and `alamat`.
#[derive(Debug, Clone, Default)]
pub struct WarehouseQuery {
    pub name: String,
    pub alamat: String,
}

fn list_base(query: &WarehouseQuery) -> SelectStatement {
    let mut base = Query::select();
    base.from("warehouse").join(
        JoinType::LeftJoin,
        "perusahaan",
        Expr::cust("perusahaan.id = warehouse.perusahaan_id"),
    );
    filter_by(
        &mut base,
        [
            contains("warehouse.name_warehouse", &query.name),
            contains("warehouse.address_warehouse", &query.alamat),
        ],
    );
    base
}

#[derive(Clone)]
pub struct WarehouseStore {
    pool: DbPool,
}

impl WarehouseStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, warehouse: &mut Warehouse) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = conn.query_one(
            "INSERT INTO warehouse (name_warehouse, address_warehouse, tlp_warehouse, ket_warehouse, user_modified, perusahaan_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING warehouse_id, created_at, version",
            &[
                &warehouse.name_warehouse,
                &warehouse.address_warehouse,
                &warehouse.tlp_warehouse,
                &warehouse.ket_warehouse,
                &warehouse.user_modified,
                &warehouse.perusahaan_id,
            ],
        )?;
        warehouse.warehouse_id = column(&row, "warehouse_id")?;
        warehouse.created_at = column(&row, "created_at")?;
        warehouse.version = column(&row, "version")?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> StoreResult<Warehouse> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        let row = query_opt(&conn, GET_SQL, &[&id])?.ok_or(StoreError::NotFound)?;
        Warehouse::from_row(&row)
    }

    pub fn update(&self, warehouse: &mut Warehouse) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "UPDATE warehouse
             SET name_warehouse = $1, address_warehouse = $2, tlp_warehouse = $3, ket_warehouse = $4,
                 user_modified = $5, perusahaan_id = $6, modified_at = now(), version = version + 1
             WHERE warehouse_id = $7 AND version = $8
             RETURNING version, modified_at",
            &[
                &warehouse.name_warehouse,
                &warehouse.address_warehouse,
                &warehouse.tlp_warehouse,
                &warehouse.ket_warehouse,
                &warehouse.user_modified,
                &warehouse.perusahaan_id,
                &warehouse.warehouse_id,
                &warehouse.version,
            ],
        )?
        .ok_or(StoreError::EditConflict)?;
        warehouse.version = column(&row, "version")?;
        warehouse.modified_at = column(&row, "modified_at")?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        expect_deleted(conn.execute("DELETE FROM warehouse WHERE warehouse_id = $1", &[&id])?)
    }

    pub fn list(
        &self,
        query: &WarehouseQuery,
        filters: &Filters,
    ) -> StoreResult<(Vec<Warehouse>, Metadata)> {
        let conn = self.pool.acquire()?;
        list_page(
            &conn,
            &list_base(query),
            SELECT_COLUMNS,
            &SORT_COLUMNS,
            filters,
            Warehouse::from_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::PostgresQueryBuilder;

    #[test]
    fn test_validation() {
        let mut v = Validator::new();
        validate_warehouse(&mut v, &Warehouse::default());
        assert_eq!(v.errors()["name_warehouse"], "must be provided");
        assert_eq!(v.errors()["perusahaan_id"], "must be provided");

        let warehouse = Warehouse::from_input(WarehouseInput {
            perusahaan_id: Some(1),
            name_warehouse: Some("Gudang Utama".to_string()),
            ..WarehouseInput::default()
        });
        let mut v = Validator::new();
        validate_warehouse(&mut v, &warehouse);
        assert!(v.valid());
    }

    #[test]
    fn test_list_base_joins_company_and_binds_both_filters() {
        let mut base = list_base(&WarehouseQuery {
            name: "utama".to_string(),
            alamat: "Jakarta".to_string(),
        });
        base.expr(Expr::cust("warehouse.warehouse_id"));
        let (sql, values) = base.build(PostgresQueryBuilder);

        assert!(sql.contains("LEFT JOIN"), "{}", sql);
        assert!(sql.contains("perusahaan.id = warehouse.perusahaan_id"), "{}", sql);
        assert!(sql.contains("warehouse.address_warehouse ILIKE $2"), "{}", sql);
        assert_eq!(values.0.len(), 2);
        assert_eq!(
            values.0[1],
            sea_query::Value::String(Some("%jakarta%".to_string()))
        );
    }
}
