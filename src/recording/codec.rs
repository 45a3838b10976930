// src/recording/codec.rs
//! Byte codec for the data log
//!
//! Payloads are stored as standard padded base64, which is reversible for
//! every byte sequence. [`render`] is a separate, lossy view used only when
//! printing messages to a terminal.

use crate::utils::errors::{Result, SpyError};
use base64::prelude::*;

/// Encode raw bytes for storage
pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Decode a stored payload
pub fn decode(text: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(text)
        .map_err(|e| SpyError::Codec(format!("Invalid base64 payload: {}", e)))
}

/// Terminal view of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendering<'a> {
    /// ASCII text with the line terminator removed
    Text(&'a str),

    /// Anything that is not plain ASCII
    Unreadable { len: usize },
}

/// Best-effort display decoding of a framed message
pub fn render(message: &[u8]) -> Rendering<'_> {
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if body.is_ascii() {
        // ASCII is always valid UTF-8
        match std::str::from_utf8(body) {
            Ok(text) => Rendering::Text(text),
            Err(_) => Rendering::Unreadable { len: message.len() },
        }
    } else {
        Rendering::Unreadable { len: message.len() }
    }
}
