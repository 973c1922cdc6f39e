//! Companies (`perusahaan`), the owners of warehouses.

use super::{column, contains, expect_deleted, filter_by, list_page, merge, merge_opt, query_opt};
use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::pool::DbPool;
use crate::validator::{present, Validator};
use chrono::{DateTime, Utc};
use may_postgres::Row;
use sea_query::{Query, SelectStatement};
use serde::{Deserialize, Serialize};

pub const SORT_COLUMNS: SortColumns = SortColumns(&[
    ("id", "perusahaan.id"),
    ("created_at", "perusahaan.created_at"),
    ("name", "perusahaan.name"),
]);

const SELECT_COLUMNS: &[&str] = &[
    "perusahaan.id",
    "perusahaan.created_at",
    "perusahaan.modified_at",
    "perusahaan.name",
    "perusahaan.address",
    "perusahaan.tlp",
    "perusahaan.npwp",
    "perusahaan.rek",
    "perusahaan.ket",
    "perusahaan.version",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Company {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub name: String,
    pub address: Option<String>,
    pub tlp: Option<String>,
    pub npwp: Option<String>,
    pub rek: Option<String>,
    pub ket: Option<String>,
    pub version: i32,
}

/// Create/update payload; absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub tlp: Option<String>,
    pub npwp: Option<String>,
    pub rek: Option<String>,
    pub ket: Option<String>,
    pub version: Option<i32>,
}

impl Company {
    pub fn from_input(input: CompanyInput) -> Self {
        let mut company = Self::default();
        company.apply(input);
        company
    }

    pub fn apply(&mut self, input: CompanyInput) {
        merge(&mut self.name, input.name);
        merge_opt(&mut self.address, input.address);
        merge_opt(&mut self.tlp, input.tlp);
        merge_opt(&mut self.npwp, input.npwp);
        merge_opt(&mut self.rek, input.rek);
        merge_opt(&mut self.ket, input.ket);
        merge(&mut self.version, input.version);
    }

    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: column(row, "id")?,
            created_at: column(row, "created_at")?,
            modified_at: column(row, "modified_at")?,
            name: column(row, "name")?,
            address: column(row, "address")?,
            tlp: column(row, "tlp")?,
            npwp: column(row, "npwp")?,
            rek: column(row, "rek")?,
            ket: column(row, "ket")?,
            version: column(row, "version")?,
        })
    }
}

pub fn validate_company(v: &mut Validator, company: &Company) {
    v.check(!company.name.trim().is_empty(), "name", "must be provided");
    v.check(present(&company.tlp), "tlp", "must be provided");
}

/// List filters: `name`.
#[derive(Debug, Clone, Default)]
pub struct CompanyQuery {
    pub name: String,
}

fn list_base(query: &CompanyQuery) -> SelectStatement {
    let mut base = Query::select();
    base.from("perusahaan");
    filter_by(&mut base, [contains("perusahaan.name", &query.name)]);
    base
}

#[derive(Clone)]
pub struct CompanyStore {
    pool: DbPool,
}

impl CompanyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, company: &mut Company) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = conn.query_one(
            "INSERT INTO perusahaan (name, address, tlp, npwp, rek, ket)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, created_at, version",
            &[
                &company.name,
                &company.address,
                &company.tlp,
                &company.npwp,
                &company.rek,
                &company.ket,
            ],
        )?;
        company.id = column(&row, "id")?;
        company.created_at = column(&row, "created_at")?;
        company.version = column(&row, "version")?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> StoreResult<Company> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "SELECT id, created_at, modified_at, name, address, tlp, npwp, rek, ket, version
             FROM perusahaan
             WHERE id = $1",
            &[&id],
        )?
        .ok_or(StoreError::NotFound)?;
        Company::from_row(&row)
    }

    /// Version-conditioned update; a stale version is an `EditConflict`.
    pub fn update(&self, company: &mut Company) -> StoreResult<()> {
        let conn = self.pool.acquire()?;
        let row = query_opt(
            &conn,
            "UPDATE perusahaan
             SET name = $1, address = $2, tlp = $3, npwp = $4, rek = $5, ket = $6,
                 modified_at = now(), version = version + 1
             WHERE id = $7 AND version = $8
             RETURNING version, modified_at",
            &[
                &company.name,
                &company.address,
                &company.tlp,
                &company.npwp,
                &company.rek,
                &company.ket,
                &company.id,
                &company.version,
            ],
        )?
        .ok_or(StoreError::EditConflict)?;
        company.version = column(&row, "version")?;
        company.modified_at = column(&row, "modified_at")?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let conn = self.pool.acquire()?;
        expect_deleted(conn.execute("DELETE FROM perusahaan WHERE id = $1", &[&id])?)
    }

    pub fn list(&self, query: &CompanyQuery, filters: &Filters) -> StoreResult<(Vec<Company>, Metadata)> {
        let conn = self.pool.acquire()?;
        list_page(
            &conn,
            &list_base(query),
            SELECT_COLUMNS,
            &SORT_COLUMNS,
            filters,
            Company::from_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{Expr, PostgresQueryBuilder};

    #[test]
    fn test_apply_keeps_absent_fields() {
        let mut company = Company {
            id: 3,
            name: "PT Maju".to_string(),
            tlp: Some("021-555".to_string()),
            version: 2,
            ..Company::default()
        };

        company.apply(CompanyInput {
            ket: Some("pusat".to_string()),
            ..CompanyInput::default()
        });

        assert_eq!(company.name, "PT Maju");
        assert_eq!(company.tlp.as_deref(), Some("021-555"));
        assert_eq!(company.ket.as_deref(), Some("pusat"));
        assert_eq!(company.version, 2);
    }

    #[test]
    fn test_validation_requires_name_and_phone() {
        let mut v = Validator::new();
        validate_company(&mut v, &Company::default());
        assert_eq!(v.errors().len(), 2);
        assert!(v.errors().contains_key("name"));
        assert!(v.errors().contains_key("tlp"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<CompanyInput, _> = serde_json::from_str(r#"{"nama": "PT Maju"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_base_filters_on_name_only_when_given() {
        let mut all = list_base(&CompanyQuery::default());
        all.expr(Expr::cust("perusahaan.id"));
        let (sql, _) = all.build(PostgresQueryBuilder);
        assert!(!sql.contains("WHERE"), "{}", sql);

        let mut named = list_base(&CompanyQuery {
            name: "maju".to_string(),
        });
        named.expr(Expr::cust("perusahaan.id"));
        let (sql, values) = named.build(PostgresQueryBuilder);
        assert!(sql.contains("perusahaan.name ILIKE $1"), "{}", sql);
        assert_eq!(values.0.len(), 1);
    }
}
