// src/recording/framer.rs
//! Newline message framing
//!
//! Socket reads split and merge messages arbitrarily. The framer recovers
//! complete `\n`-terminated messages and carries the unterminated tail over
//! to the next read. Messages keep their terminator, so the concatenation of
//! every framed message plus the remainder is always exactly the input.
//!
//! An empty read is the end-of-stream signal: whatever is pending is
//! released as a final, possibly unterminated, message.

use bytes::{Bytes, BytesMut};

const NEWLINE: u8 = b'\n';

/// Frame `new_data` appended to `buffer`
///
/// Returns the complete messages in order and the new carry-over buffer.
pub fn frame(buffer: &[u8], new_data: &[u8]) -> (Vec<Bytes>, BytesMut) {
    let mut data = BytesMut::with_capacity(buffer.len() + new_data.len());
    data.extend_from_slice(buffer);
    data.extend_from_slice(new_data);

    let messages = split_messages(&mut data, new_data.is_empty());
    (messages, data)
}

/// Drain complete messages from the front of `data`
fn split_messages(data: &mut BytesMut, end_of_stream: bool) -> Vec<Bytes> {
    let mut messages = Vec::new();

    while let Some(pos) = data.iter().position(|&b| b == NEWLINE) {
        messages.push(data.split_to(pos + 1).freeze());
    }

    if end_of_stream && !data.is_empty() {
        messages.push(data.split().freeze());
    }

    messages
}

/// Unterminated tail of one direction of one connection
#[derive(Debug, Default)]
pub struct PendingBuffer {
    buf: BytesMut,
}

impl PendingBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read into the buffer and take the messages it completed
    ///
    /// An empty `data` slice flushes, like [`PendingBuffer::finish`].
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(data);
        split_messages(&mut self.buf, data.is_empty())
    }

    /// Release pending bytes as a final message
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }

    /// Number of bytes waiting for a terminator
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
