//! The stock aggregate: a stock item (`stok`) and the detail lines
//! (`stok_detail`) that pin quantities of it to racks.
//!
//! Writes run in one transaction per call:
//!
//! * insert: the item row, then one multi-row insert for all lines;
//! * update: the version-conditioned item update, then delete every line,
//!   then one multi-row insert of the replacement lines;
//! * delete: every line, then the item.
//!
//! Any failure rolls the whole transaction back. The item quantity is never
//! stored; reads derive it as the sum of the line quantities.

use super::{column, contains, filter_by, list_page, merge, merge_opt};
use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::pool::DbPool;
use crate::transaction::run_in_transaction;
use crate::validator::Validator;
use crate::value_conversion::with_converted_params;
use chrono::{DateTime, Utc};
use may_postgres::Row;
use rust_decimal::Decimal;
use sea_query::{Expr, InsertStatement, JoinType, PostgresQueryBuilder, Query, SelectStatement};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Most detail lines one item may carry; every line is seven bind
/// parameters in the bulk insert.
pub const MAX_LINES: usize = 1000;

pub const SORT_COLUMNS: SortColumns = SortColumns(&[
    ("id", "stok.id"),
    ("created_at", "stok.created_at"),
    ("produk_code", "stok.produk_code"),
]);

const SELECT_COLUMNS: &[&str] = &[
    "stok.id",
    "stok.created_at",
    "stok.modified_at",
    "stok.produk_code",
    "stok.produk_ket",
    "stok.buy::text AS buy",
    "stok.sell::text AS sell",
    "stok.year",
    "stok.chasis",
    "stok.brand_id",
    "stok.model_id",
    "stok.version",
    "brand.name AS brandname",
    "brandmodel.name AS modelname",
    "COALESCE((SELECT SUM(stok_detail.qty) FROM stok_detail WHERE stok_detail.stok_id = stok.id), 0) AS qty",
];

const INSERT_ITEM_SQL: &str = "INSERT INTO stok (id, produk_code, produk_ket, buy, sell, year, chasis, brand_id, model_id, created_at, version)
     VALUES ($1, $2, $3, $4::text::numeric, $5::text::numeric, $6, $7, $8, $9, $10, 1)";

const UPDATE_ITEM_SQL: &str = "UPDATE stok
     SET produk_code = $1, produk_ket = $2, buy = $3::text::numeric, sell = $4::text::numeric,
         year = $5, chasis = $6,
         brand_id = $7, model_id = $8, modified_at = now(), version = version + 1
     WHERE id = $9 AND version = $10";

const DELETE_LINES_SQL: &str = "DELETE FROM stok_detail WHERE stok_id = $1";

const DELETE_ITEM_SQL: &str = "DELETE FROM stok WHERE id = $1";

/// The item with its brand/model names, the pre-aggregated quantity and one
/// row per line (a single row with NULL line columns when it has none).
const GET_SQL: &str = "SELECT stok.id, stok.created_at, stok.modified_at, stok.produk_code, stok.produk_ket,
        stok.buy::text AS buy, stok.sell::text AS sell, stok.year, stok.chasis, stok.brand_id, stok.model_id, stok.version,
        brand.name AS brandname, brandmodel.name AS modelname,
        COALESCE(total.qty, 0) AS qty,
        stok_detail.id AS line_id, stok_detail.qty AS line_qty, stok_detail.satuan,
        stok_detail.rak_id, rak.rak_code, stok_detail.warehouse_id, warehouse.name_warehouse
     FROM stok
     LEFT JOIN brand ON brand.id = stok.brand_id
     LEFT JOIN brandmodel ON brandmodel.id = stok.model_id
     LEFT JOIN (
         SELECT stok_id, SUM(qty) AS qty FROM stok_detail WHERE stok_id = $1 GROUP BY stok_id
     ) total ON total.stok_id = stok.id
     LEFT JOIN stok_detail ON stok_detail.stok_id = stok.id
     LEFT JOIN rak ON rak.rak_id = stok_detail.rak_id
     LEFT JOIN warehouse ON warehouse.warehouse_id = stok_detail.warehouse_id
     WHERE stok.id = $1
     ORDER BY stok_detail.line_no";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub produk_code: String,
    pub produk_ket: Option<String>,
    pub buy: Option<Decimal>,
    pub sell: Option<Decimal>,
    pub year: Option<String>,
    pub chasis: Option<String>,
    pub brand_id: Option<i64>,
    pub model_id: Option<i64>,
    pub brandname: Option<String>,
    pub modelname: Option<String>,
    /// Sum of the line quantities.
    pub qty: f64,
    pub version: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jsonstokdetail: Vec<StockDetailLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockDetailLine {
    pub id: String,
    pub qty: f64,
    pub satuan: Option<String>,
    pub rak_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rak_code: Option<String>,
    pub warehouse_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_warehouse: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockInput {
    pub produk_code: Option<String>,
    pub produk_ket: Option<String>,
    pub buy: Option<Decimal>,
    pub sell: Option<Decimal>,
    pub year: Option<String>,
    pub chasis: Option<String>,
    pub brand_id: Option<i64>,
    pub model_id: Option<i64>,
    pub version: Option<i32>,
    pub jsonstokdetail: Option<Vec<StockDetailInput>>,
    // Read-only fields of a previous read, accepted and ignored so a client
    // can send an item back as it received it.
    #[serde(default)]
    pub id: Option<IgnoredAny>,
    #[serde(default)]
    pub created_at: Option<IgnoredAny>,
    #[serde(default)]
    pub modified_at: Option<IgnoredAny>,
    #[serde(default)]
    pub brandname: Option<IgnoredAny>,
    #[serde(default)]
    pub modelname: Option<IgnoredAny>,
    #[serde(default)]
    pub qty: Option<IgnoredAny>,
}

/// A line as sent by clients. Read-only fields echoed back from a previous
/// read (`id`, `rak_code`, `name_warehouse`) are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockDetailInput {
    pub qty: Option<f64>,
    pub satuan: Option<String>,
    pub rak_id: Option<i64>,
    pub warehouse_id: Option<i64>,
}

impl StockDetailLine {
    pub fn from_input(input: StockDetailInput) -> Self {
        Self {
            id: String::new(),
            qty: input.qty.unwrap_or_default(),
            satuan: input.satuan,
            rak_id: input.rak_id.unwrap_or_default(),
            rak_code: None,
            warehouse_id: input.warehouse_id.unwrap_or_default(),
            name_warehouse: None,
        }
    }
}

impl StockItem {
    pub fn from_input(input: StockInput) -> Self {
        let mut item = Self::default();
        item.apply(input);
        item
    }

    /// Overwrites present scalar fields and replaces the line set.
    ///
    /// A missing or empty `jsonstokdetail` leaves the item with no lines.
    pub fn apply(&mut self, input: StockInput) {
        merge(&mut self.produk_code, input.produk_code);
        merge_opt(&mut self.produk_ket, input.produk_ket);
        merge_opt(&mut self.buy, input.buy);
        merge_opt(&mut self.sell, input.sell);
        merge_opt(&mut self.year, input.year);
        merge_opt(&mut self.chasis, input.chasis);
        merge_opt(&mut self.brand_id, input.brand_id);
        merge_opt(&mut self.model_id, input.model_id);
        merge(&mut self.version, input.version);
        self.jsonstokdetail = input
            .jsonstokdetail
            .unwrap_or_default()
            .into_iter()
            .map(StockDetailLine::from_input)
            .collect();
        self.qty = total_qty(&self.jsonstokdetail);
    }

    fn from_list_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: column(row, "id")?,
            created_at: column(row, "created_at")?,
            modified_at: column(row, "modified_at")?,
            produk_code: column(row, "produk_code")?,
            produk_ket: column(row, "produk_ket")?,
            buy: decimal_column(row, "buy")?,
            sell: decimal_column(row, "sell")?,
            year: column(row, "year")?,
            chasis: column(row, "chasis")?,
            brand_id: column(row, "brand_id")?,
            model_id: column(row, "model_id")?,
            brandname: column(row, "brandname")?,
            modelname: column(row, "modelname")?,
            qty: column(row, "qty")?,
            version: column(row, "version")?,
            jsonstokdetail: Vec::new(),
        })
    }
}

/// NUMERIC travels as text in both directions.
fn decimal_column(row: &Row, name: &str) -> StoreResult<Option<Decimal>> {
    column::<Option<String>>(row, name)?
        .map(|text| {
            text.parse::<Decimal>()
                .map_err(|e| StoreError::Decode(format!("column `{}`: {}", name, e)))
        })
        .transpose()
}

fn decimal_param(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn total_qty(lines: &[StockDetailLine]) -> f64 {
    lines.iter().map(|line| line.qty).sum()
}

pub fn validate_stock(v: &mut Validator, item: &StockItem) {
    v.check(!item.produk_code.trim().is_empty(), "produk_code", "must be provided");
    v.check(
        item.brand_id.map_or(true, |id| id > 0),
        "brand_id",
        "must be greater than zero",
    );
    v.check(
        item.model_id.map_or(true, |id| id > 0),
        "model_id",
        "must be greater than zero",
    );
    v.check(
        item.jsonstokdetail.len() <= MAX_LINES,
        "jsonstokdetail",
        &format!("must not contain more than {} lines", MAX_LINES),
    );
    for (i, line) in item.jsonstokdetail.iter().enumerate() {
        v.check(
            line.rak_id > 0,
            &format!("jsonstokdetail[{}].rak_id", i),
            "must be provided",
        );
        v.check(
            line.warehouse_id > 0,
            &format!("jsonstokdetail[{}].warehouse_id", i),
            "must be provided",
        );
        v.check(
            line.qty.is_finite() && line.qty >= 0.0,
            &format!("jsonstokdetail[{}].qty", i),
            "must be zero or more",
        );
    }
}

/// List filters: `code`, `ket`, `brandname` and `modelname`.
#[derive(Debug, Clone, Default)]
pub struct StockQuery {
    pub code: String,
    pub ket: String,
    pub brandname: String,
    pub modelname: String,
}

fn list_base(query: &StockQuery) -> SelectStatement {
    let mut base = Query::select();
    base.from("stok")
        .join(
            JoinType::LeftJoin,
            "brand",
            Expr::cust("brand.id = stok.brand_id"),
        )
        .join(
            JoinType::LeftJoin,
            "brandmodel",
            Expr::cust("brandmodel.id = stok.model_id"),
        );
    filter_by(
        &mut base,
        [
            contains("stok.produk_code", &query.code),
            contains("stok.produk_ket", &query.ket),
            contains("brand.name", &query.brandname),
            contains("brandmodel.name", &query.modelname),
        ],
    );
    base
}

/// Assigns fresh ids to `lines` and builds one multi-row insert for them.
fn lines_insert_statement(
    stok_id: &str,
    lines: &mut [StockDetailLine],
) -> StoreResult<InsertStatement> {
    let mut insert = Query::insert();
    insert.into_table("stok_detail").columns([
        "id",
        "stok_id",
        "line_no",
        "qty",
        "satuan",
        "rak_id",
        "warehouse_id",
    ]);
    for (line_no, line) in lines.iter_mut().enumerate() {
        line.id = Uuid::new_v4().to_string();
        insert
            .values([
                line.id.clone().into(),
                stok_id.to_string().into(),
                (line_no as i32).into(),
                line.qty.into(),
                line.satuan.clone().into(),
                line.rak_id.into(),
                line.warehouse_id.into(),
            ])
            .map_err(|e| StoreError::Database(e.into()))?;
    }
    Ok(insert)
}

fn insert_lines<E: Executor + ?Sized>(
    exec: &E,
    stok_id: &str,
    lines: &mut [StockDetailLine],
) -> StoreResult<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let (sql, values) = lines_insert_statement(stok_id, lines)?.build(PostgresQueryBuilder);
    with_converted_params(&values, |params| exec.execute(&sql, params))?;
    Ok(())
}

/// Item row plus all its lines; assigns the item and line ids.
pub(crate) fn insert_stock<E: Executor + ?Sized>(exec: &E, item: &mut StockItem) -> StoreResult<()> {
    item.id = Uuid::new_v4().to_string();
    item.created_at = Utc::now();
    item.version = 1;

    let buy = decimal_param(item.buy);
    let sell = decimal_param(item.sell);
    exec.execute(
        INSERT_ITEM_SQL,
        &[
            &item.id,
            &item.produk_code,
            &item.produk_ket,
            &buy,
            &sell,
            &item.year,
            &item.chasis,
            &item.brand_id,
            &item.model_id,
            &item.created_at,
        ],
    )?;
    insert_lines(exec, &item.id, &mut item.jsonstokdetail)?;
    item.qty = total_qty(&item.jsonstokdetail);
    Ok(())
}

/// Conditioned item update, then a full replacement of the lines.
pub(crate) fn update_stock<E: Executor + ?Sized>(exec: &E, item: &mut StockItem) -> StoreResult<()> {
    let buy = decimal_param(item.buy);
    let sell = decimal_param(item.sell);
    let updated = exec.execute(
        UPDATE_ITEM_SQL,
        &[
            &item.produk_code,
            &item.produk_ket,
            &buy,
            &sell,
            &item.year,
            &item.chasis,
            &item.brand_id,
            &item.model_id,
            &item.id,
            &item.version,
        ],
    )?;
    if updated == 0 {
        return Err(StoreError::EditConflict);
    }

    exec.execute(DELETE_LINES_SQL, &[&item.id])?;
    insert_lines(exec, &item.id, &mut item.jsonstokdetail)?;

    item.version += 1;
    item.qty = total_qty(&item.jsonstokdetail);
    Ok(())
}

/// Lines first, then the item; `NotFound` when the item row is absent.
pub(crate) fn delete_stock<E: Executor + ?Sized>(exec: &E, id: &str) -> StoreResult<()> {
    exec.execute(DELETE_LINES_SQL, &[&id])?;
    if exec.execute(DELETE_ITEM_SQL, &[&id])? == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// One row of the item read, decoded.
#[derive(Debug, Clone, Default)]
struct StockRow {
    item: StockItem,
    line: Option<StockDetailLine>,
}

impl StockRow {
    fn from_row(row: &Row) -> StoreResult<Self> {
        let item = StockItem::from_list_row(row)?;
        let line_id: Option<String> = column(row, "line_id")?;
        let line = match line_id {
            Some(id) => Some(StockDetailLine {
                id,
                qty: column(row, "line_qty")?,
                satuan: column(row, "satuan")?,
                rak_id: column(row, "rak_id")?,
                rak_code: column(row, "rak_code")?,
                warehouse_id: column(row, "warehouse_id")?,
                name_warehouse: column(row, "name_warehouse")?,
            }),
            None => None,
        };
        Ok(Self { item, line })
    }
}

/// Folds the joined rows into one item; `None` when there are no rows.
fn fold_rows(rows: Vec<StockRow>) -> Option<StockItem> {
    let mut rows = rows.into_iter();
    let first = rows.next()?;
    let mut item = first.item;
    item.jsonstokdetail = first.line.into_iter().chain(rows.filter_map(|r| r.line)).collect();
    Some(item)
}

#[derive(Clone)]
pub struct StockStore {
    pool: DbPool,
    transaction_timeout: Option<Duration>,
}

impl StockStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            transaction_timeout: None,
        }
    }

    /// Bounds every write transaction; past the deadline it rolls back and
    /// the call fails with `StoreError::Timeout`.
    pub fn with_transaction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    pub fn insert(&self, item: &mut StockItem) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        run_in_transaction(conn.client(), self.transaction_timeout, |tx| {
            insert_stock(tx, item)
        })?;
        log::debug!(
            "inserted stock item {} with {} lines",
            item.id,
            item.jsonstokdetail.len()
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> StoreResult<StockItem> {
        let id = id.trim();
        if id.is_empty() {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        let rows = conn
            .query_all(GET_SQL, &[&id])?
            .iter()
            .map(StockRow::from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        fold_rows(rows).ok_or(StoreError::NotFound)
    }

    /// `EditConflict` when `item.version` is no longer the stored version.
    pub fn update(&self, item: &mut StockItem) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        run_in_transaction(conn.client(), self.transaction_timeout, |tx| {
            update_stock(tx, item)
        })
    }

    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        run_in_transaction(conn.client(), self.transaction_timeout, |tx| {
            delete_stock(tx, id)
        })
    }

    /// Items with their derived quantity; lines are not included.
    pub fn list(&self, query: &StockQuery, filters: &Filters) -> StoreResult<(Vec<StockItem>, Metadata)> {
        let conn = self.pool.acquire()?;
        list_page(
            &conn,
            &list_base(query),
            SELECT_COLUMNS,
            &SORT_COLUMNS,
            filters,
            StockItem::from_list_row,
        )
    }
}
