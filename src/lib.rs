// src/lib.rs
//! rrd-spy library
//!
//! Intercepts the rrdcached Unix socket, relays every byte between clients
//! and the daemon, and records the traffic so it can be replayed or read
//! back later without either side.
//!
//! # Architecture
//!
//! - **recording**: newline framing, payload codec, JSON-lines data log
//! - **interception**: socket path swap, per-client connections, relay
//! - **executor**: record / replay / decipher modes
//! - **observability**: tracing setup
//! - **utils**: configuration and errors

// Public module exports
pub mod executor;
pub mod interception;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use executor::{RecordOptions, RecordSummary};
pub use utils::config::SpyConfig;
pub use utils::errors::{Result, SpyError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
