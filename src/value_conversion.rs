//! Bridges sea-query bind values to `may_postgres` parameters.
//!
//! Dynamic statements (filtered lists, multi-row inserts) are built with
//! sea-query and come back as `(sql, Values)`. Each value is copied into an
//! owned, typed parameter first; the `&dyn ToSql` slice handed to the driver
//! borrows from those owned parameters and is only valid inside the closure.
//!
//! NULLs keep the type of the column they bind to, so a `NULL` text filter is
//! bound as `Option<String>` rather than an untyped placeholder.

use crate::executor::ExecError;
use may_postgres::types::ToSql;
use sea_query::{Value, Values};

/// Converts `values` and runs `f` with the resulting parameter slice.
///
/// # Errors
///
/// Returns `ExecError::QueryError` for value kinds the service never binds
/// (and for unsigned values that do not fit a `BIGINT`), otherwise whatever
/// `f` returns.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, ExecError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, ExecError>,
{
    let owned = values
        .iter()
        .map(owned_param)
        .collect::<Result<Vec<_>, _>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref()).collect();
    f(&params)
}

fn owned_param(value: &Value) -> Result<Box<dyn ToSql>, ExecError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i16::from)),
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i16::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(v) => {
            let converted = v
                .map(|u| {
                    i64::try_from(u).map_err(|_| {
                        ExecError::QueryError(format!(
                            "BigUnsigned value {} exceeds i64::MAX ({}), cannot be bound as BIGINT",
                            u,
                            i64::MAX
                        ))
                    })
                })
                .transpose()?;
            Box::new(converted)
        }
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::String(v) => Box::new(v.clone()),
        Value::Bytes(v) => Box::new(v.clone()),
        Value::Json(v) => {
            let text = v
                .as_ref()
                .map(|j| serde_json::to_string(&**j))
                .transpose()
                .map_err(|e| ExecError::QueryError(format!("Failed to serialize JSON: {}", e)))?;
            Box::new(text)
        }
        other => {
            return Err(ExecError::QueryError(format!(
                "Unsupported value type in query: {:?}",
                other
            )))
        }
    };
    Ok(param)
}
