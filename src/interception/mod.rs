// src/interception/mod.rs
//! Socket interception layer
//!
//! - **Socket Swap**: moves the daemon's socket aside and guarantees it is put back
//! - **Connection**: per-client session state (id, pending buffers, counters)
//! - **Relay**: bidirectional forwarding with logging
//!
//! # Architecture
//!
//! ```text
//! client ──▶ /run/rrdcached.sock (rrd-spy listener)
//!                 │
//!                 ├─ Relay ── DataLog (send/recv records)
//!                 │
//!                 └─▶ /run/rrdcached.sock.original (real daemon, one shared connection)
//! ```

pub mod connection;
pub mod relay;
pub mod socket_swap;

// Re-export commonly used types
pub use connection::{Connection, ConnectionStats};
pub use relay::{ConnectionEnd, Relay};
pub use socket_swap::{aside_path, SocketSwap};
