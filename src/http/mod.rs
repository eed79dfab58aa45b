//! HTTP server exposing setup, verify and execute calls under a base path.

pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;

pub use routes::build_router;
pub use state::AppState;
