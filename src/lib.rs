//! # Fake Dependency Library
//!
//! A service-virtualization server that stands in for downstream HTTP
//! dependencies during integration testing.
//!
//! This library provides components for:
//! - **Setup**: Queue canned responses keyed by URI, correlation id, method and query
//! - **Execute**: Serve queued responses in FIFO order, then the last one forever
//! - **Verify**: Read back the payloads and headers the system under test sent
//! - **Default Mocks**: Answer unmatched requests from URI patterns loaded from YAML
//! - **In-Memory Storage**: TTL-bounded value, list and set storage
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use fakedep::{http::build_router, MemoryStore};
//!
//! # async fn example() -> std::io::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//!
//! // Build HTTP router with state
//! let state = fakedep::http::AppState::builder()
//!     .with_store(store)
//!     .with_base_path("/fake-dependency/api")
//!     .build()?;
//! let app = build_router(state);
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod defaults;
pub mod error;
pub mod http;
pub mod method;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod request;
pub mod retriever;
pub mod store;

// Re-export commonly used types for convenience
pub use composer::KeyComposer;
pub use defaults::{DefaultMock, DefaultMockBook, DefaultMockProvider, PatternMock};
pub use error::MockError;
pub use method::HttpMethod;
pub use model::{MockEntry, MockResponse, VerifyMode};
pub use orchestrator::{MockOrchestrator, Verification};
pub use parser::Payload;
pub use request::MockRequest;
pub use retriever::{MockDataRetriever, Resolution};
pub use store::{KeyValueStore, MemoryStore, Space, StoredValue};
