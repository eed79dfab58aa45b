//! Error taxonomy for setup, execute and verify operations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::http::types::ErrorResponse;
use crate::method::HttpMethod;

/// Errors surfaced to the caller of a mock operation.
///
/// None of these are retried internally; retry-until-consistent semantics
/// belong to the calling test framework.
#[derive(Debug, Error)]
pub enum MockError {
    /// The payload parser reached a value that is neither a map nor a string.
    #[error("payload of type {0} is not supported, pass either a JSON map or an XML/form string")]
    UnsupportedPayloadType(&'static str),

    /// A control header named a method outside the known verb set.
    #[error("{0} is not a valid http method, valid methods are {}", HttpMethod::known_list())]
    IllegalHttpMethod(String),

    /// Neither a stored mock nor a default mock pattern matched the request.
    #[error("no mock set up and no default mock matches {uri}")]
    MockNotFound { uri: String },

    /// A mock entry was set up with a status code that cannot be served.
    #[error("http status {0} is not a valid response status")]
    InvalidStatus(u16),

    /// The verification mode query parameter has an unknown value.
    #[error("unknown verification mode {0}, expected one of list, last, detailed")]
    InvalidVerifyMode(String),

    /// A setup body is not a mock entry.
    #[error("invalid mock entry: {0}")]
    InvalidEntry(#[from] serde_json::Error),
}

impl MockError {
    /// Short machine-readable error kind used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedPayloadType(_) => "unsupported_payload_type",
            Self::IllegalHttpMethod(_) => "illegal_http_method",
            Self::MockNotFound { .. } => "mock_not_found",
            Self::InvalidStatus(_) => "invalid_status",
            Self::InvalidVerifyMode(_) => "invalid_verify_mode",
            Self::InvalidEntry(_) => "invalid_entry",
        }
    }

    /// HTTP status the error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MockNotFound { .. } => StatusCode::NOT_FOUND,
            Self::UnsupportedPayloadType(_)
            | Self::IllegalHttpMethod(_)
            | Self::InvalidStatus(_)
            | Self::InvalidVerifyMode(_)
            | Self::InvalidEntry(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        (
            self.status_code(),
            Json(ErrorResponse { status: "error", error_type: self.kind(), error: &message }),
        )
            .into_response()
    }
}
