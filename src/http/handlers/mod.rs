//! HTTP handlers for different API endpoints.

pub mod health;
pub mod mock;

// Re-export handlers for easier access
pub use health::healthz;
pub use mock::dispatch;
