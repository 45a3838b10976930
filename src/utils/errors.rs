// src/utils/errors.rs
//! Error types shared by every mode
//!
//! Framing never fails, so there is no framing variant. Everything else maps
//! onto one of the classes below; the record loop uses
//! [`SpyError::is_fatal_daemon_loss`] to tell a lost daemon apart from local
//! failures.

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SpyError>;

/// Errors produced by rrd-spy
#[derive(Debug, Error)]
pub enum SpyError {
    /// The canonical socket could not be moved aside or replaced
    #[error("Interception failed: {0}")]
    InterceptionFailed(String),

    /// The aside socket could not be renamed back to the canonical path
    #[error("Failed to restore socket: {0}")]
    RestoreFailed(String),

    /// Connecting to the daemon failed
    #[error("Failed to connect to daemon: {0}")]
    DaemonConnectFailed(String),

    /// The daemon closed its end of the shared connection
    #[error("Daemon closed the connection")]
    DaemonDisconnected,

    /// Reading from or writing to the daemon failed
    #[error("Daemon I/O error: {0}")]
    DaemonIo(String),

    /// The data log could not be opened
    #[error("Failed to open data log: {0}")]
    LogOpen(String),

    /// Appending to the data log failed
    #[error("Data log write failed: {0}")]
    LogWrite(String),

    /// A data log line is not a valid record
    #[error("Malformed data log line {line}: {reason}")]
    LogFormat { line: usize, reason: String },

    /// A recorded payload is not valid base64
    #[error("Corrupted payload: {0}")]
    Codec(String),

    /// Replay could not continue
    #[error("Replay failed: {0}")]
    ReplayFailed(String),

    /// The pidfile could not be written
    #[error("Pidfile error: {0}")]
    PidFileFailed(String),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SpyError {
    /// True when the shared daemon link is gone and no client can be served
    pub fn is_fatal_daemon_loss(&self) -> bool {
        matches!(self, SpyError::DaemonDisconnected | SpyError::DaemonIo(_))
    }
}

impl From<config::ConfigError> for SpyError {
    fn from(e: config::ConfigError) -> Self {
        SpyError::ConfigError(e.to_string())
    }
}
