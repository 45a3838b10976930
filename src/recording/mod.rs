// src/recording/mod.rs
//! Traffic capture and the data log
//!
//! - **Framer**: newline framing with per-direction carry-over buffers
//! - **Codec**: reversible base64 payload encoding plus a display renderer
//! - **Data Log**: JSON-lines append/iterate
//!
//! # Data flow
//!
//! ```text
//! socket read → PendingBuffer::push → complete messages → DataLog::append
//!                                                              ↓
//!                                               {"id","type","message","time"}
//! ```

pub mod codec;
pub mod data_log;
pub mod framer;

// Re-export commonly used types
pub use codec::{decode, encode, render, Rendering};
pub use data_log::{DataLog, Direction, LogReader, LogRecord, Records};
pub use framer::{frame, PendingBuffer};
