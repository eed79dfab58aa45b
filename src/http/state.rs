//! Application state and configuration for the HTTP server.

use std::io;
use std::sync::Arc;

use axum::http::HeaderName;

use crate::defaults::{DefaultMockBook, DefaultMockProvider};
use crate::orchestrator::MockOrchestrator;
use crate::store::KeyValueStore;

/// Base path of the mock API when none is configured.
pub const DEFAULT_BASE_PATH: &str = "/fake-dependency/api";

/// Correlation id header when none is configured.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Setup, execute and verify operations
    pub mocks: MockOrchestrator,
    /// Store shared with the orchestrator, kept for maintenance tasks
    pub store: Arc<dyn KeyValueStore>,
    /// Prefix of every mock route, without trailing slash
    pub base_path: Arc<str>,
}

impl AppState {
    /// Get a builder for configuring application state step by step.
    ///
    /// # Returns
    ///
    /// Returns an `AppStateBuilder` for fluent configuration.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Builder for constructing AppState with fluent interface.
#[derive(Default)]
pub struct AppStateBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    defaults: Option<DefaultMockBook>,
    request_id_headers: Option<Vec<String>>,
    base_path: Option<String>,
}

impl AppStateBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store implementation.
    ///
    /// # Parameters
    ///
    /// - `store` - Store to keep mocks and verification records in
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the default mock book.
    ///
    /// # Parameters
    ///
    /// - `defaults` - Defaults served when nothing is set up
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_defaults(mut self, defaults: DefaultMockBook) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Set the headers whose values form the correlation id, in order.
    pub fn with_request_id_headers(mut self, headers: Vec<String>) -> Self {
        self.request_id_headers = Some(headers);
        self
    }

    /// Set the prefix of every mock route, e.g. `/fake-dependency/api`.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Build the final AppState with validation.
    ///
    /// # Errors
    ///
    /// Returns error if the store is not provided, if a correlation id header
    /// is not a valid header name, or if the default mock book does not compile.
    pub fn build(self) -> io::Result<AppState> {
        // Validate required dependencies
        let store = self.store.ok_or(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Store is required for AppState",
        ))?;

        let request_id_headers = self
            .request_id_headers
            .unwrap_or_else(|| vec![DEFAULT_REQUEST_ID_HEADER.to_string()])
            .into_iter()
            .map(|name| {
                HeaderName::try_from(name.trim()).map(|h| h.as_str().to_string()).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Invalid correlation id header name: {name}"),
                    )
                })
            })
            .collect::<io::Result<Vec<_>>>()?;

        let base_path = normalize_base_path(self.base_path.as_deref().unwrap_or(DEFAULT_BASE_PATH));

        let mocks = self
            .defaults
            .unwrap_or_default()
            .compile()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let defaults = DefaultMockProvider::new(mocks, store.clone());

        Ok(AppState {
            mocks: MockOrchestrator::new(store.clone(), defaults, request_id_headers),
            store,
            base_path: base_path.into(),
        })
    }
}

/// Leading slash, no trailing slash; the root becomes the empty prefix.
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
