//! Catch-all handler for setup, verify and execute calls.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::error::MockError;
use crate::http::state::AppState;
use crate::method::HttpMethod;
use crate::model::{MockEntry, VerifyMode};
use crate::parser::query::verify_mode_param;
use crate::request::MockRequest;

/// Dispatch a request below the base path.
///
/// Calls on a `mock-resources` path are setups (POST), binary overlays
/// (PATCH) or verifications (GET). Everything else is served as an execute.
///
/// # Parameters
///
/// - `state` - Application state holding the orchestrator
/// - `path` - Path below the base path
///
/// # Returns
///
/// Returns the echoed entry, the verification view, or the mock response.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, MockError> {
    debug!(method = %method, path = %path, query = ?query, headers = ?headers, "incoming request");

    let method = HttpMethod::try_from(&method)?;
    let mut request = MockRequest::new(method, path).with_body(body);
    request.query = query.filter(|q| !q.is_empty());
    request.headers = headers;

    if !request.is_mock_resources() {
        let response = state.mocks.execute(&request).await?;
        return Ok(response.into_response());
    }

    match request.method {
        HttpMethod::Post => {
            let entry = if request.body.is_empty() {
                MockEntry::default()
            } else {
                serde_json::from_slice::<MockEntry>(&request.body)?
            };
            let entry = state.mocks.setup(entry, &request)?;
            Ok((StatusCode::OK, Json(entry)).into_response())
        }
        HttpMethod::Patch => {
            state.mocks.patch_setup(&request)?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        HttpMethod::Get => {
            let mode = match verify_mode_param(request.query.as_deref()) {
                Some(mode) => mode.parse::<VerifyMode>()?,
                None => VerifyMode::default(),
            };
            debug!(path = %request.path, mode = ?mode, "verify call");
            Ok(state.mocks.verify(&request, mode)?.into_response())
        }
        _ => {
            let response = state.mocks.execute(&request).await?;
            Ok(response.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;

    use crate::store::MemoryStore;

    use super::*;

    fn create_test_state() -> AppState {
        AppState::builder()
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .expect("valid configuration")
    }

    async fn call(state: &AppState, method: Method, path: &str, query: Option<&str>, body: &'static [u8]) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("h1"));
        dispatch(
            State(state.clone()),
            method,
            Path(path.to_string()),
            RawQuery(query.map(str::to_string)),
            headers,
            Bytes::from_static(body),
        )
        .await
        .unwrap_or_else(IntoResponse::into_response)
    }

    /// Test setup, execute and verify through the dispatcher.
    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let state = create_test_state();

        let response =
            call(&state, Method::POST, "svc/mock-resources/a", None, br#"{"responseBody": "hi"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&state, Method::POST, "svc/a", None, br#"{"x": 1}"#).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response =
            call(&state, Method::GET, "svc/mock-resources/a", Some("verifyMockContent=list"), b"").await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("parse JSON");
        assert_eq!(json, serde_json::json!([{"x": 1}]));
    }

    /// Test that an empty setup body registers an empty 200 response.
    #[tokio::test]
    async fn test_empty_setup_body() {
        let state = create_test_state();
        let response = call(&state, Method::POST, "svc/mock-resources/empty", None, b"").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&state, Method::GET, "svc/empty", None, b"").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        assert!(body.is_empty());
    }

    /// Test rejection of methods outside the known set.
    #[tokio::test]
    async fn test_unknown_method() {
        let state = create_test_state();
        let method = Method::from_bytes(b"PURGE").expect("valid method token");
        let response = call(&state, method, "svc/a", None, b"").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
