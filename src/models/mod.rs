//! Entity types and their stores.
//!
//! Every store takes a [`DbPool`](crate::pool::DbPool) in its constructor and
//! checks a connection out per call. Fixed statements are plain SQL with `$n`
//! parameters; lists and multi-row inserts are built with sea-query so that
//! every filter value stays a bound parameter.

pub mod brand;
pub mod brand_model;
pub mod company;
pub mod rack;
pub mod stock;
pub mod warehouse;

pub use brand::{Brand, BrandInput, BrandStore};
pub use brand_model::{BrandModel, BrandModelInput, BrandModelStore};
pub use company::{Company, CompanyInput, CompanyStore};
pub use rack::{Rack, RackInput, RackStore};
pub use stock::{StockDetailInput, StockDetailLine, StockInput, StockItem, StockStore};
pub use warehouse::{Warehouse, WarehouseInput, WarehouseStore};

use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::filters::{calculate_metadata, Filters, Metadata, SortColumns};
use crate::value_conversion::with_converted_params;
use may_postgres::types::{FromSql, ToSql};
use may_postgres::Row;
use sea_query::extension::postgres::PgExpr;
use sea_query::{Expr, LikeExpr, Order, PostgresQueryBuilder, SelectStatement};

/// Reads a named column, reporting the column on failure.
pub(crate) fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> StoreResult<T> {
    row.try_get(name)
        .map_err(|e| StoreError::Decode(format!("column `{}`: {}", name, e)))
}

/// First row of the result, if any.
pub(crate) fn query_opt<E: Executor + ?Sized>(
    exec: &E,
    sql: &str,
    params: &[&dyn ToSql],
) -> StoreResult<Option<Row>> {
    Ok(exec.query_all(sql, params)?.into_iter().next())
}

/// Case-insensitive substring match of `needle` against `column`, folded
/// by the server through `ILIKE`.
///
/// `None` for a blank needle, so an empty filter matches every row
/// (including rows where the column is NULL).
pub(crate) fn contains(column: &'static str, needle: &str) -> Option<Expr> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    let pattern = format!("%{}%", escape_like(needle));
    Some(Expr::cust(column).ilike(LikeExpr::new(pattern).escape('\\')))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Applies every present filter to `query`.
pub(crate) fn filter_by(query: &mut SelectStatement, conditions: impl IntoIterator<Item = Option<Expr>>) {
    for condition in conditions.into_iter().flatten() {
        query.and_where(condition);
    }
}

/// One page of a filtered list plus its metadata.
///
/// `base` carries the FROM, joins and WHERE; `select` the projected column
/// expressions. The total comes from a `count(*) OVER()` column on the same
/// statement; when a page past the end comes back empty a plain count is run
/// so the metadata still reports the real total.
pub(crate) fn list_page<E, T, F>(
    exec: &E,
    base: &SelectStatement,
    select: &[&'static str],
    sort: &SortColumns,
    filters: &Filters,
    mut decode: F,
) -> StoreResult<(Vec<T>, Metadata)>
where
    E: Executor + ?Sized,
    F: FnMut(&Row) -> StoreResult<T>,
{
    let mut page = base.clone();
    for expr in select {
        page.expr(Expr::cust(*expr));
    }
    page.expr_as(Expr::cust("count(*) OVER()"), "total_records")
        .order_by_expr(Expr::cust(filters.sort_column(sort)), filters.sort_order());
    if let Some(id) = sort.column("id") {
        page.order_by_expr(Expr::cust(id), Order::Asc);
    }
    page.limit(filters.limit()).offset(filters.offset());

    let (sql, values) = page.build(PostgresQueryBuilder);
    let rows = with_converted_params(&values, |params| exec.query_all(&sql, params))?;

    let mut total: i64 = 0;
    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        total = column(row, "total_records")?;
        items.push(decode(row)?);
    }

    if rows.is_empty() && filters.page > 1 {
        let mut count = base.clone();
        count.expr(Expr::cust("count(*)"));
        let (sql, values) = count.build(PostgresQueryBuilder);
        let row = with_converted_params(&values, |params| exec.query_one(&sql, params))?;
        total = row
            .try_get(0)
            .map_err(|e| StoreError::Decode(format!("count: {}", e)))?;
    }

    Ok((items, calculate_metadata(total, filters.page, filters.page_size)))
}

/// `NotFound` when a delete touched nothing.
pub(crate) fn expect_deleted(rows_affected: u64) -> StoreResult<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

/// Present fields of an update input overwrite the stored value.
pub(crate) fn merge<T>(target: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming {
        *target = value;
    }
}

/// Like [`merge`], for nullable columns.
pub(crate) fn merge_opt<T>(target: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *target = incoming;
    }
}
