//! # gudang
//!
//! Warehouse and stock inventory REST service on PostgreSQL, running on the
//! `may` coroutine runtime.
//!
//! Companies (`perusahaan`) own warehouses, warehouses hold racks (`rak`), and
//! stock items (`stok`) classified by brand and brand model are pinned to
//! racks through detail lines. Every entity has create, read, update
//! (optimistic version check), delete and a filtered, paginated list.

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod filters;
pub mod http;
pub mod metrics;
pub mod models;
pub mod pool;
pub mod transaction;
pub mod validator;
pub mod value_conversion;

#[cfg(test)]
mod mock;

pub use config::AppConfig;
pub use error::{StoreError, StoreResult};
pub use pool::DbPool;
