//! JSON responses and the mapping from failures to status codes.

use crate::error::StoreError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: "Content-Type: application/json",
            body: value.to_string().into_bytes(),
        }
    }

    /// `{"<key>": value}`.
    pub fn envelope<T: Serialize>(status: u16, key: &str, value: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(value).map_err(|e| ApiError::Server(e.to_string()))?;
        let mut body = Map::new();
        body.insert(key.to_string(), value);
        Ok(Self::json(status, &Value::Object(body)))
    }

    pub fn text(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "Content-Type: text/plain; version=0.0.4; charset=utf-8",
            body,
        }
    }
}

/// Every failure a request can end in.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    MethodNotAllowed(String),
    BadRequest(String),
    Validation(BTreeMap<String, String>),
    EditConflict,
    Unavailable(String),
    /// Details are logged, never sent.
    Server(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::EditConflict => ApiError::EditConflict,
            other => ApiError::Server(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::NotFound => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::BadRequest(_) => 400,
            ApiError::Validation(_) => 422,
            ApiError::EditConflict => 409,
            ApiError::Unavailable(_) => 503,
            ApiError::Server(_) => 500,
        }
    }

    /// Builds the `{"error": ...}` response, logging server-side failures.
    pub fn into_response(self, method: &str, path: &str) -> ApiResponse {
        let status = self.status();
        let message = match self {
            ApiError::NotFound => json!("the requested resource could not be found"),
            ApiError::MethodNotAllowed(method) => {
                json!(format!("the {} method is not supported for this resource", method))
            }
            ApiError::BadRequest(message) => json!(message),
            ApiError::Validation(errors) => json!(errors),
            ApiError::EditConflict => {
                json!("unable to update the record due to an edit conflict, please try again")
            }
            ApiError::Unavailable(detail) => {
                log::warn!("{} {}: unavailable: {}", method, path, detail);
                json!("the server is temporarily unable to handle the request")
            }
            ApiError::Server(detail) => {
                log::error!("{} {}: {}", method, path, detail);
                json!("the server encountered a problem and could not process your request")
            }
        };
        ApiResponse::json(status, &json!({ "error": message }))
    }
}

/// Reason phrase for the status line.
pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}
