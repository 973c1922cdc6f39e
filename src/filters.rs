//! Pagination, sorting and list metadata shared by every list endpoint.

use crate::validator::{permitted_value, Validator};
use sea_query::Order;
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_SORT: &str = "-created_at";

/// Maps the sort keys a client may send to the column they order by.
///
/// Every key is accepted bare (ascending) and with a `-` prefix
/// (descending).
#[derive(Debug, Clone, Copy)]
pub struct SortColumns(pub &'static [(&'static str, &'static str)]);

impl SortColumns {
    pub fn column(&self, key: &str) -> Option<&'static str> {
        self.0
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, column)| *column)
    }

    /// Both spellings of every key.
    pub fn safelist(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(name, _)| [name.to_string(), format!("-{}", name)])
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl Filters {
    pub fn validate(&self, v: &mut Validator, columns: &SortColumns) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );
        v.check(
            permitted_value(&self.sort, &columns.safelist()),
            "sort",
            "invalid sort value",
        );
    }

    /// The column to order by. Falls back to `created_at` for a key that is
    /// not in `columns`, which validation has already rejected.
    pub fn sort_column(&self, columns: &SortColumns) -> &'static str {
        columns
            .column(self.sort.trim_start_matches('-'))
            .or_else(|| columns.column("created_at"))
            .unwrap_or("created_at")
    }

    pub fn sort_order(&self) -> Order {
        if self.sort.starts_with('-') {
            Order::Desc
        } else {
            Order::Asc
        }
    }

    pub fn limit(&self) -> u64 {
        self.page_size.max(1) as u64
    }

    pub fn offset(&self) -> u64 {
        ((self.page.max(1) - 1) * self.page_size.max(1)) as u64
    }
}

/// Paging details returned alongside every list.
///
/// All fields are zero, and omitted from the JSON, when nothing matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records <= 0 || page_size <= 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}
