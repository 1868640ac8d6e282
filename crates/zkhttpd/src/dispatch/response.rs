//! Response values produced by the dispatcher.
//!
//! A [`DispatchResponse`] is an HTTP status plus an optional JSON object. It
//! converts into an axum response; `Content-Type: application/json` is only
//! set when a body is present.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::ser::Error as _;
use serde_json::{Map, Value};

use super::errors::DispatchError;

/// Status and optional body returned for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    status: StatusCode,
    body: Option<Map<String, Value>>,
}

impl DispatchResponse {
    /// A 200 response without a body.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            body: None,
        }
    }

    /// A 200 response carrying `body`.
    #[must_use]
    pub const fn ok_with(body: Map<String, Value>) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    /// Converts an error into its status and `{"message": ...}` body.
    #[must_use]
    pub fn from_error(error: &DispatchError) -> Self {
        let mut body = Map::with_capacity(1);
        body.insert("message".to_owned(), Value::String(error.to_string()));
        Self {
            status: error.status(),
            body: Some(body),
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// JSON body, when present.
    #[must_use]
    pub const fn body(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref()
    }
}

impl IntoResponse for DispatchResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(Value::Object(body))).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// Serializes a typed response body into a JSON object.
///
/// # Errors
///
/// Returns `SerializeResponse` if serialization fails or does not produce an
/// object.
pub fn object_body<T: Serialize>(body: &T) -> Result<Map<String, Value>, DispatchError> {
    match serde_json::to_value(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(DispatchError::SerializeResponse(serde_json::Error::custom(
            "response body is not a JSON object",
        ))),
    }
}
