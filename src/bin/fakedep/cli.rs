//! Command-line interface definitions for the fake dependency server.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line arguments for the fake dependency server.
#[derive(Debug, Parser)]
#[command(name = "fakedep")]
#[command(author, version, about = "Fake downstream HTTP dependency: set up, serve and verify mocks")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:18080")]
    pub listen: String,

    /// Prefix of every mock route
    #[arg(long, default_value = "/fake-dependency/api")]
    pub base_path: String,

    /// Lifetime of stored mocks and records (e.g. 30m, 2h)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30m")]
    pub ttl: Duration,

    /// Headers forming the correlation id, in order (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "X-Request-ID")]
    pub request_id_headers: Vec<String>,

    /// Path to YAML default mocks file
    #[arg(long)]
    pub defaults: Option<PathBuf>,

    /// Interval between sweeps of expired entries
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1m")]
    pub sweep_interval: Duration,
}
