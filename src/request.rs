//! Transport-independent view of an inbound request.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;

use crate::method::HttpMethod;
use crate::model::{HeaderValues, MOCK_RESOURCES};
use crate::parser::{parse_query, Payload, QueryMap};

/// An inbound request as seen by the mock engine.
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// Actual HTTP method of the call
    pub method: HttpMethod,
    /// Path below the configured base path, starting with `/`
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    /// Create a request without query, headers or body.
    ///
    /// # Parameters
    ///
    /// - `method` - HTTP method of the call
    /// - `path` - Path below the base path
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self { method, path, query: None, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// Set the raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Append a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether this is a setup or verify call (`mock-resources` segment present).
    pub fn is_mock_resources(&self) -> bool {
        self.path.split('/').any(|segment| segment == &MOCK_RESOURCES[1..])
    }

    /// Normalized URI used in composite keys: the first `mock-resources`
    /// segment removed.
    pub fn key_uri(&self) -> String {
        let marker = &MOCK_RESOURCES[1..];
        let mut removed = false;
        let segments: Vec<&str> = self
            .path
            .split('/')
            .filter(|segment| {
                if !removed && *segment == marker {
                    removed = true;
                    return false;
                }
                true
            })
            .collect();
        let uri = segments.join("/");
        if uri.is_empty() {
            "/".to_string()
        } else {
            uri
        }
    }

    /// First value of a header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Correlation id: values of the configured headers that are present,
    /// joined with `-` in configured order.
    pub fn correlation_id(&self, header_names: &[String]) -> Option<String> {
        let values: Vec<&str> =
            header_names.iter().filter_map(|name| self.header(name)).collect();
        (!values.is_empty()).then(|| values.join("-"))
    }

    /// Parsed query parameters, excluding the verification parameter.
    pub fn query_map(&self) -> QueryMap {
        parse_query(self.query.as_deref())
    }

    /// Payload of an execute call; GET and DELETE never carry one.
    pub fn payload(&self) -> Option<Payload> {
        if self.method.is_bodiless() {
            return None;
        }
        Some(Payload::from_body(&self.body))
    }

    /// Request headers as captured for verification.
    pub fn captured_headers(&self) -> HeaderValues {
        let mut captured = HeaderValues::new();
        for (name, value) in &self.headers {
            captured
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        captured
    }
}
