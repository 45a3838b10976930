// src/observability/mod.rs
//! Diagnostic logging setup
//!
//! Operation is quiet by default. Each `-v` raises the level one step; IO
//! tracing (every read and write with its length) is emitted at `trace`.
//! `RUST_LOG`, when set, overrides the verbosity flag. Output goes to stderr
//! so decipher output on stdout stays clean.

use crate::utils::config::LogFormat;
use crate::utils::errors::{Result, SpyError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Map a `-v` count to a default filter directive
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber
pub fn init_tracing(verbosity: u8, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| SpyError::ConfigError(format!("Failed to install tracing: {}", e)))
}
