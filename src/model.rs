//! Mock entries, served responses and verification views.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::MockError;

/// Path segment marking setup and verify calls.
pub const MOCK_RESOURCES: &str = "/mock-resources";

/// Query parameter selecting the verification view.
pub const VERIFY_MODE_PARAM: &str = "verifyMockContent";

/// Header declaring the HTTP method a setup call is meant for.
pub const HTTP_METHOD_HEADER: &str = "x-fake-dependency-http-method";

/// Header naming another request header to parse instead of the body.
pub const PARSE_PAYLOAD_HEADER: &str = "x-fake-dependency-parse-payload-header";

/// Response headers of a mock: name to values.
pub type HeaderValues = BTreeMap<String, Vec<String>>;

/// A canned response registered by a setup call.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockEntry {
    /// Body to serve; `null` serves an empty body.
    #[serde(default)]
    pub response_body: Value,
    /// Status and latency of the response.
    #[serde(default)]
    pub response_set_up_metadata: ResponseMetadata,
    /// Headers to serve.
    #[serde(default)]
    pub response_headers: HeaderValues,
}

/// Status and simulated latency of a mock response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(default = "default_status")]
    pub http_status: u16,
    #[serde(default)]
    pub delay_ms: u64,
}

const fn default_status() -> u16 {
    200
}

impl Default for ResponseMetadata {
    fn default() -> Self {
        Self { http_status: default_status(), delay_ms: 0 }
    }
}

impl MockEntry {
    /// Create an entry with a body and status and no delay or headers.
    pub fn new(response_body: Value, http_status: u16) -> Self {
        Self {
            response_body,
            response_set_up_metadata: ResponseMetadata { http_status, delay_ms: 0 },
            response_headers: HeaderValues::new(),
        }
    }

    /// Reject entries that could never be served.
    ///
    /// # Errors
    ///
    /// Returns `MockError::InvalidStatus` if the status is not a valid HTTP status.
    pub fn validate(&self) -> Result<(), MockError> {
        let status = self.response_set_up_metadata.http_status;
        StatusCode::from_u16(status).map(|_| ()).map_err(|_| MockError::InvalidStatus(status))
    }

    /// Configured delay before the response is sent.
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.response_set_up_metadata.delay_ms)
    }

    /// Build the response to serve, optionally replacing the body with raw bytes.
    pub fn into_response_with(self, binary: Option<Bytes>) -> MockResponse {
        let body = match binary {
            Some(bytes) => MockBody::Binary(bytes),
            None => MockBody::Json(self.response_body),
        };
        MockResponse {
            status: self.response_set_up_metadata.http_status,
            headers: self.response_headers,
            body,
        }
    }
}

/// Body of a served mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBody {
    Json(Value),
    Binary(Bytes),
}

/// A mock ready to be written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: HeaderValues,
    pub body: MockBody,
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let (content_type, body) = match self.body {
            MockBody::Json(Value::Null) => (None, Body::empty()),
            MockBody::Json(Value::String(text)) => (Some("text/plain; charset=utf-8"), Body::from(text)),
            MockBody::Json(value) => (Some("application/json"), Body::from(value.to_string())),
            MockBody::Binary(bytes) => (Some("application/octet-stream"), Body::from(bytes)),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, values) in &self.headers {
            let Ok(name) = HeaderName::from_str(name) else {
                warn!(header = %name, "skipping invalid mock response header name");
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        headers.append(name.clone(), value);
                    }
                    Err(_) => warn!(header = %name, "skipping invalid mock response header value"),
                }
            }
        }
        if let Some(content_type) = content_type {
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }

        response
    }
}

/// View returned by a verify call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// All captured payloads.
    #[default]
    List,
    /// The last raw request body.
    Last,
    /// Captured payloads with their request headers.
    Detailed,
}

impl FromStr for VerifyMode {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "last" => Ok(Self::Last),
            "detailed" => Ok(Self::Detailed),
            _ => Err(MockError::InvalidVerifyMode(s.to_string())),
        }
    }
}

/// Captured requests with their headers, aligned by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRequests {
    pub count: usize,
    pub requests: Vec<RecordedRequest>,
}

/// One captured execute call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub payload: Value,
    pub headers: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Test deserialization defaults of the wire format.
    #[test]
    fn test_mock_entry_defaults() {
        let entry: MockEntry = serde_json::from_str(r#"{"responseBody": {"a": 1}}"#).expect("valid JSON");
        assert_eq!(entry.response_body, json!({"a": 1}));
        assert_eq!(entry.response_set_up_metadata.http_status, 200);
        assert_eq!(entry.delay(), Duration::ZERO);
        assert!(entry.response_headers.is_empty());

        let entry: MockEntry = serde_json::from_str(
            r#"{
                "responseSetUpMetadata": {"httpStatus": 201, "delayMs": 150},
                "responseHeaders": {"X-Trace": ["a", "b"]}
            }"#,
        )
        .expect("valid JSON");
        assert_eq!(entry.response_body, Value::Null);
        assert_eq!(entry.response_set_up_metadata.http_status, 201);
        assert_eq!(entry.delay(), Duration::from_millis(150));
        assert_eq!(entry.response_headers["X-Trace"], vec!["a", "b"]);
    }

    /// Test validation of status codes.
    #[test]
    fn test_validate_status() {
        assert!(MockEntry::new(Value::Null, 204).validate().is_ok());
        assert!(matches!(
            MockEntry::new(Value::Null, 1000).validate(),
            Err(MockError::InvalidStatus(1000))
        ));
    }

    /// Test conversion of a JSON mock into an HTTP response.
    #[tokio::test]
    async fn test_json_response() {
        let mut entry = MockEntry::new(json!({"ok": true}), 201);
        entry.response_headers.insert("X-Multi".into(), vec!["1".into(), "2".into()]);

        let response = entry.into_response_with(None).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers().get_all("x-multi").iter().count(), 2);

        let (_, body) = response.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX).await.expect("read body");
        let json: Value = serde_json::from_slice(&body_bytes).expect("parse JSON");
        assert_eq!(json, json!({"ok": true}));
    }

    /// Test that a binary overlay replaces the body and keeps status and headers.
    #[tokio::test]
    async fn test_binary_overlay_response() {
        let mut entry = MockEntry::new(json!({"ignored": true}), 200);
        entry.response_headers.insert("Content-Type".into(), vec!["application/pdf".into()]);

        let response =
            entry.into_response_with(Some(Bytes::from_static(b"%PDF-1.4"))).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

        let (_, body) = response.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX).await.expect("read body");
        assert_eq!(&body_bytes[..], b"%PDF-1.4");
    }

    /// Test verify mode parsing.
    #[test]
    fn test_verify_mode() {
        assert_eq!("LIST".parse::<VerifyMode>().expect("known"), VerifyMode::List);
        assert_eq!("detailed".parse::<VerifyMode>().expect("known"), VerifyMode::Detailed);
        assert_eq!("last".parse::<VerifyMode>().expect("known"), VerifyMode::Last);
        assert!(matches!("all".parse::<VerifyMode>(), Err(MockError::InvalidVerifyMode(_))));
    }
}
