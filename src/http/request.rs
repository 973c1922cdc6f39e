//! Request decoding: method, query string, JSON bodies and list filters.

use super::response::ApiError;
use crate::filters::{Filters, DEFAULT_PAGE_SIZE, DEFAULT_SORT};
use crate::validator::Validator;
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use std::collections::HashMap;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
    Other,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            _ => Method::Other,
        }
    }
}

/// A fully read request, independent of the server it came from.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub method_name: String,
    pub path: String,
    pub query: QueryParams,
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Splits `target` into path and query string.
    pub fn new(method: &str, target: &str, body: Vec<u8>) -> Result<Self, ApiError> {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Ok(Self {
            method: Method::parse(method),
            method_name: method.to_string(),
            path: path.to_string(),
            query: QueryParams::parse(raw_query)?,
            body,
        })
    }
}

/// Reads at most `limit` bytes of body.
pub fn read_body<R: Read>(reader: R, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| ApiError::BadRequest(format!("body could not be read: {}", e)))?;
    if body.len() > limit {
        return Err(ApiError::BadRequest(format!(
            "body must not be larger than {} bytes",
            limit
        )));
    }
    Ok(body)
}

/// Decodes a single JSON value, turning serde errors into client messages.
pub fn read_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("body must not be empty".to_string()));
    }
    serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(describe_json_error(&err)))
}

fn describe_json_error(err: &serde_json::Error) -> String {
    let message = err.to_string();
    match err.classify() {
        Category::Syntax if message.starts_with("trailing characters") => {
            "body must only contain a single JSON value".to_string()
        }
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {} column {})",
            err.line(),
            err.column()
        ),
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Data if message.starts_with("unknown field") => {
            let field = message.split('`').nth(1).unwrap_or_default();
            format!("body contains unknown key \"{}\"", field)
        }
        Category::Data if message.starts_with("invalid type") => format!(
            "body contains incorrect JSON type (at line {} column {})",
            err.line(),
            err.column()
        ),
        Category::Data => format!("body contains invalid data: {}", message),
        Category::Io => "body could not be read".to_string(),
    }
}

/// Decoded query string; the first value of a repeated key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("malformed query string: {}", e)))?;
        let mut params = HashMap::new();
        for (key, value) in pairs {
            params.entry(key).or_insert(value);
        }
        Ok(Self(params))
    }

    pub fn read_string(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => default.to_string(),
        }
    }

    /// Integer value of `key`, or `default` when absent. A value that does
    /// not parse is recorded on `v` and `default` returned.
    pub fn read_int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
                v.add_error(key, "must be an integer value");
                default
            }),
            _ => default,
        }
    }

    /// `page`, `page_size` and `sort`, unvalidated.
    pub fn read_filters(&self, v: &mut Validator) -> Filters {
        Filters {
            page: self.read_int("page", 1, v),
            page_size: self.read_int("page_size", DEFAULT_PAGE_SIZE, v),
            sort: self.read_string("sort", DEFAULT_SORT),
        }
    }
}
