//! Setup, execute and verify operations over the store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info};

use crate::composer::{with_query, KeyComposer};
use crate::defaults::DefaultMockProvider;
use crate::error::MockError;
use crate::model::{DetailedRequests, MockEntry, MockResponse, RecordedRequest, VerifyMode};
use crate::parser::Payload;
use crate::request::MockRequest;
use crate::retriever::MockDataRetriever;
use crate::store::{KeyValueStore, Space, StoredValue};

/// Calls recorded under a key, in the requested view.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// Captured payloads in call order.
    Payloads(Vec<Value>),
    /// Raw body of the last call, empty if none.
    Last(Bytes),
    Detailed(DetailedRequests),
}

impl IntoResponse for Verification {
    fn into_response(self) -> Response {
        match self {
            Self::Payloads(payloads) => (StatusCode::OK, Json(payloads)).into_response(),
            Self::Detailed(detailed) => (StatusCode::OK, Json(detailed)).into_response(),
            Self::Last(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                response
            }
        }
    }
}

/// Entry point of every mock operation.
#[derive(Clone)]
pub struct MockOrchestrator {
    store: Arc<dyn KeyValueStore>,
    composer: KeyComposer,
    retriever: MockDataRetriever,
    request_id_headers: Arc<Vec<String>>,
}

impl MockOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Parameters
    ///
    /// - `store` - Store shared by every operation
    /// - `defaults` - Defaults served when nothing is set up
    /// - `request_id_headers` - Headers whose values form the correlation id, in order
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        defaults: DefaultMockProvider,
        request_id_headers: Vec<String>,
    ) -> Self {
        Self {
            composer: KeyComposer::new(store.clone()),
            retriever: MockDataRetriever::new(store.clone(), defaults),
            store,
            request_id_headers: Arc::new(request_id_headers),
        }
    }

    fn correlation_id(&self, request: &MockRequest) -> Option<String> {
        request.correlation_id(&self.request_id_headers)
    }

    /// Keys a setup or binary overlay writes to: one per base key, with the
    /// literal query appended.
    fn setup_keys(&self, request: &MockRequest) -> Result<(Vec<String>, Vec<String>), MockError> {
        let id = self.correlation_id(request);
        let base = self.composer.base_keys(id.as_deref(), request, false)?;
        let query = request.query_map();
        let keys = base.iter().map(|base| with_query(base, &query)).collect();
        Ok((base, keys))
    }

    /// Queue a mock entry for an eventual execute call.
    ///
    /// The query parameter names of the setup become the query signature of
    /// the base key, so that executes carrying the same fields in their body
    /// still match.
    ///
    /// # Returns
    ///
    /// Returns the entry as stored.
    ///
    /// # Errors
    ///
    /// Returns `MockError::InvalidStatus` for an unservable status, or
    /// `MockError::IllegalHttpMethod` for an unknown target method header.
    pub fn setup(&self, entry: MockEntry, request: &MockRequest) -> Result<MockEntry, MockError> {
        entry.validate()?;
        let value = serde_json::to_value(&entry)?;
        let (base_keys, keys) = self.setup_keys(request)?;
        let fields: Vec<String> = request.query_map().into_keys().collect();

        for (base, key) in base_keys.iter().zip(&keys) {
            if !fields.is_empty() {
                self.store.add_to_set(&Space::Query, base, &fields);
            }
            self.composer.record_parse_payload_header(base, request);
            self.store.push_list(&Space::Execute, key, StoredValue::Json(value.clone()));
            info!(key = %key, status = entry.response_set_up_metadata.http_status, "mock set up");
        }
        Ok(entry)
    }

    /// Queue raw bytes replacing the body of the next served entry.
    ///
    /// # Errors
    ///
    /// Returns `MockError::IllegalHttpMethod` for an unknown target method header.
    pub fn patch_setup(&self, request: &MockRequest) -> Result<(), MockError> {
        let (_, keys) = self.setup_keys(request)?;
        for key in &keys {
            self.store.push_list(&Space::Binary, key, StoredValue::Binary(request.body.clone()));
            info!(key = %key, bytes = request.body.len(), "binary body set up");
        }
        Ok(())
    }

    /// Serve a request of the system under test.
    ///
    /// The call is recorded for verification under the key it matched;
    /// default mock hits are not recorded.
    ///
    /// # Errors
    ///
    /// Returns `MockError::MockNotFound` if nothing answers, or
    /// `MockError::UnsupportedPayloadType` if a discriminator cannot be read
    /// from the payload.
    pub async fn execute(&self, request: &MockRequest) -> Result<MockResponse, MockError> {
        let id = self.correlation_id(request);
        let payload = request.payload();
        let keys = self.composer.keys_with_discriminators(id.as_deref(), request, payload.as_ref())?;
        debug!(method = %request.method, keys = ?keys, "executing mock");

        let resolution = self.retriever.resolve(&keys, request, payload.as_ref()).await?;
        if let Some(key) = &resolution.matched_key {
            self.record(key, request, payload.as_ref());
        }
        Ok(resolution.response)
    }

    fn record(&self, key: &str, request: &MockRequest, payload: Option<&Payload>) {
        // Calls without a payload are recorded as the empty string
        let payload = payload.map_or_else(|| Value::String(String::new()), Payload::to_json);
        let headers: serde_json::Map<String, Value> = request
            .captured_headers()
            .into_iter()
            .map(|(name, values)| (name, Value::from(values)))
            .collect();

        self.store.push_list(&Space::VerifyPayload, key, StoredValue::Json(payload));
        // The value slot holds the last raw body, pushed payloads stay in the list
        self.store.set_value(&Space::VerifyPayload, key, StoredValue::Binary(request.body.clone()));
        self.store.push_list(&Space::VerifyHeaders, key, StoredValue::Json(Value::Object(headers)));
    }

    /// Read back the calls recorded for a request.
    ///
    /// Keys are derived as for an execute but without a payload. The first
    /// key with recorded calls is read.
    ///
    /// # Errors
    ///
    /// Returns `MockError::IllegalHttpMethod` for an unknown target method header.
    pub fn verify(&self, request: &MockRequest, mode: VerifyMode) -> Result<Verification, MockError> {
        let id = self.correlation_id(request);
        let keys = self.composer.keys_with_discriminators(id.as_deref(), request, None)?;

        let mut payloads = Vec::new();
        let mut key = keys.first().map(String::as_str).unwrap_or_default();
        for candidate in &keys {
            let recorded = self.store.list_all(&Space::VerifyPayload, candidate);
            if !recorded.is_empty() {
                payloads = recorded;
                key = candidate.as_str();
                break;
            }
        }
        debug!(key = %key, calls = payloads.len(), "verifying mock");

        let payloads: Vec<Value> = payloads.iter().map(stored_to_json).collect();
        let verification = match mode {
            VerifyMode::List => Verification::Payloads(payloads),
            VerifyMode::Last => {
                let last = match self.store.get_value(&Space::VerifyPayload, key) {
                    Some(StoredValue::Binary(bytes)) => bytes,
                    _ => Bytes::new(),
                };
                Verification::Last(last)
            }
            VerifyMode::Detailed => {
                let headers = self.store.list_all(&Space::VerifyHeaders, key);
                let requests: Vec<RecordedRequest> = payloads
                    .into_iter()
                    .zip(headers.iter().map(stored_to_json))
                    .map(|(payload, headers)| RecordedRequest { payload, headers })
                    .collect();
                Verification::Detailed(DetailedRequests { count: requests.len(), requests })
            }
        };
        Ok(verification)
    }
}

fn stored_to_json(value: &StoredValue) -> Value {
    match value {
        StoredValue::Json(value) => value.clone(),
        StoredValue::Binary(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::method::HttpMethod;
    use crate::model::{MockBody, HTTP_METHOD_HEADER};
    use crate::store::MemoryStore;

    fn orchestrator() -> MockOrchestrator {
        let store = Arc::new(MemoryStore::new());
        let defaults = DefaultMockProvider::new(Vec::new(), store.clone());
        MockOrchestrator::new(store, defaults, vec!["x-request-id".to_string()])
    }

    fn body(response: &MockResponse) -> &MockBody {
        &response.body
    }

    /// Test setup with a correlation id and execute with and without it.
    #[tokio::test]
    async fn test_correlation_id_binding() {
        let orchestrator = orchestrator();
        let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/users")
            .with_header("X-Request-ID", "r1");
        orchestrator.setup(MockEntry::new(json!("bound"), 200), &setup).expect("set up");

        let other = MockRequest::new(HttpMethod::Get, "/svc/users").with_header("X-Request-ID", "r2");
        assert!(matches!(
            orchestrator.execute(&other).await,
            Err(MockError::MockNotFound { .. })
        ));

        let same = MockRequest::new(HttpMethod::Get, "/svc/users").with_header("X-Request-ID", "r1");
        let response = orchestrator.execute(&same).await.expect("served");
        assert_eq!(body(&response), &MockBody::Json(json!("bound")));
    }

    /// Test that id-free setups answer requests carrying any id.
    #[tokio::test]
    async fn test_id_free_fallback() {
        let orchestrator = orchestrator();
        let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/users");
        orchestrator.setup(MockEntry::new(json!("shared"), 200), &setup).expect("set up");

        let request = MockRequest::new(HttpMethod::Get, "/svc/users").with_header("X-Request-ID", "r9");
        let response = orchestrator.execute(&request).await.expect("served");
        assert_eq!(body(&response), &MockBody::Json(json!("shared")));
    }

    /// Test that setups are rejected for unservable statuses and methods.
    #[test]
    fn test_setup_validation() {
        let orchestrator = orchestrator();
        let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/users");
        assert!(matches!(
            orchestrator.setup(MockEntry::new(Value::Null, 42), &setup),
            Err(MockError::InvalidStatus(42))
        ));

        let setup = setup.with_header(HTTP_METHOD_HEADER, "FETCH");
        assert!(matches!(
            orchestrator.setup(MockEntry::new(Value::Null, 200), &setup),
            Err(MockError::IllegalHttpMethod(_))
        ));
    }

    /// Test that a query field set up in the URL matches the same field in the body.
    #[tokio::test]
    async fn test_query_field_in_body() {
        let orchestrator = orchestrator();
        for id in ["1", "2"] {
            let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/orders")
                .with_query(format!("order.id={id}"));
            orchestrator.setup(MockEntry::new(json!(format!("order {id}")), 200), &setup).expect("set up");
        }

        let request = MockRequest::new(HttpMethod::Post, "/svc/orders")
            .with_body(r#"{"order": {"id": "2"}}"#);
        let response = orchestrator.execute(&request).await.expect("served");
        assert_eq!(body(&response), &MockBody::Json(json!("order 2")));
    }

    /// Test recording and the three verification views.
    #[tokio::test]
    async fn test_verify_views() {
        let orchestrator = orchestrator();
        let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/events");
        orchestrator.setup(MockEntry::new(Value::Null, 202), &setup).expect("set up");

        for n in [1, 2] {
            let request = MockRequest::new(HttpMethod::Post, "/svc/events")
                .with_header("X-Trace", &n.to_string())
                .with_body(format!(r#"{{"n": {n}}}"#));
            orchestrator.execute(&request).await.expect("served");
        }

        let verify = MockRequest::new(HttpMethod::Get, "/svc/mock-resources/events");
        let list = orchestrator.verify(&verify, VerifyMode::List).expect("verified");
        assert_eq!(list, Verification::Payloads(vec![json!({"n": 1}), json!({"n": 2})]));

        let last = orchestrator.verify(&verify, VerifyMode::Last).expect("verified");
        assert_eq!(last, Verification::Last(Bytes::from_static(br#"{"n": 2}"#)));

        let Verification::Detailed(detailed) =
            orchestrator.verify(&verify, VerifyMode::Detailed).expect("verified")
        else {
            panic!("expected detailed view");
        };
        assert_eq!(detailed.count, 2);
        assert_eq!(detailed.requests[0].payload, json!({"n": 1}));
        assert_eq!(detailed.requests[1].headers["x-trace"], json!(["2"]));
    }

    /// Test that calls without a payload are recorded as empty strings.
    #[tokio::test]
    async fn test_verify_bodiless_calls() {
        let orchestrator = orchestrator();
        let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/a");
        orchestrator.setup(MockEntry::new(json!("ok"), 200), &setup).expect("set up");

        for _ in 0..3 {
            orchestrator.execute(&MockRequest::new(HttpMethod::Get, "/svc/a")).await.expect("served");
        }

        let verify = MockRequest::new(HttpMethod::Get, "/svc/mock-resources/a");
        assert_eq!(
            orchestrator.verify(&verify, VerifyMode::List).expect("verified"),
            Verification::Payloads(vec![json!(""), json!(""), json!("")])
        );
    }

    /// Test that nothing is recorded for verification before an execute.
    #[test]
    fn test_verify_without_calls() {
        let orchestrator = orchestrator();
        let verify = MockRequest::new(HttpMethod::Get, "/svc/mock-resources/nothing");
        assert_eq!(
            orchestrator.verify(&verify, VerifyMode::List).expect("verified"),
            Verification::Payloads(Vec::new())
        );
        assert_eq!(
            orchestrator.verify(&verify, VerifyMode::Last).expect("verified"),
            Verification::Last(Bytes::new())
        );
    }

    /// Test the binary overlay set up through a patch call.
    #[tokio::test]
    async fn test_patch_setup() {
        let orchestrator = orchestrator();
        let setup = MockRequest::new(HttpMethod::Post, "/svc/mock-resources/file");
        orchestrator.setup(MockEntry::new(json!("placeholder"), 200), &setup).expect("set up");
        let patch = MockRequest::new(HttpMethod::Patch, "/svc/mock-resources/file")
            .with_body(Bytes::from_static(&[0xca, 0xfe]));
        orchestrator.patch_setup(&patch).expect("patched");

        let request = MockRequest::new(HttpMethod::Get, "/svc/file");
        let response = orchestrator.execute(&request).await.expect("served");
        assert_eq!(body(&response), &MockBody::Binary(Bytes::from_static(&[0xca, 0xfe])));
    }
}
