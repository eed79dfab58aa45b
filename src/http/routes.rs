//! HTTP routing configuration for all API endpoints.

use axum::{
    routing::{any, get},
    Router,
};

use crate::http::handlers::*;
use crate::http::state::AppState;

/// Build the Axum router with all API endpoints.
///
/// # Parameters
///
/// - `state` - Application state containing configuration and dependencies
///
/// # Returns
///
/// Returns configured Axum `Router` with the health check and the catch-all
/// mock route under the base path.
pub fn build_router(state: AppState) -> Router {
    let mock_route = format!("{}/{{*path}}", state.base_path);
    Router::new()
        .route("/healthz", get(healthz))
        // Setup, verify and execute calls
        .route(&mock_route, any(dispatch))
        .with_state(state)
}
