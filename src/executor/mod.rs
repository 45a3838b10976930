// src/executor/mod.rs
//! Mode orchestration
//!
//! - **Record**: intercept the socket, relay and log every connection
//! - **Replay**: re-send recorded client traffic against a live socket
//! - **Decipher**: print a recorded log as text, offline
//!
//! ```text
//! record   = SocketSwap + Relay + DataLog(write)
//! replay   = DataLog(read) + one live connection
//! decipher = DataLog(read) + framer
//! ```

pub mod decipher;
pub mod record;
pub mod replay;

// Re-export commonly used types
pub use decipher::{decipher, DecipherSummary};
pub use record::{run_record, shutdown_on_signals, RecordOptions, RecordSummary};
pub use replay::{replay, run_replay, ReplaySummary};
