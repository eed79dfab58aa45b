//! # Fake Dependency Server CLI
//!
//! Command-line interface for the fake dependency server.
//!
//! This binary runs the mock API with an in-memory store, optional default
//! mocks and a periodic sweep of expired entries.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use fakedep::defaults::DefaultMockBook;
use fakedep::http::{build_router, AppState};
use fakedep::store::MemoryStore;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load default mocks (can work without file - every miss is a 404)
    let book = if let Some(path) = &cli.defaults {
        DefaultMockBook::load_from_path(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
    } else {
        DefaultMockBook::default()
    };
    tracing::info!(routes = book.routes.len(), "loaded default mocks");

    let store = Arc::new(MemoryStore::with_ttl(cli.ttl));
    spawn_sweeper(store.clone(), cli.sweep_interval);

    let state = AppState::builder()
        .with_store(store)
        .with_defaults(book)
        .with_request_id_headers(cli.request_id_headers)
        .with_base_path(cli.base_path)
        .build()?;
    let base_path = state.base_path.clone();

    let app = build_router(state);

    let addr: SocketAddr = cli.listen.parse().map_err(io::Error::other)?;
    tracing::info!("starting fakedep on http://{addr}{base_path}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

/// Periodically drop expired entries; reads already ignore them.
fn spawn_sweeper(store: Arc<MemoryStore>, interval: Duration) {
    if interval.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "swept expired entries");
            }
        }
    });
}
