// src/interception/connection.rs
//! One accepted client session

use crate::recording::data_log::{DataLog, Direction};
use crate::recording::framer::PendingBuffer;
use crate::utils::errors::Result;

/// Per-connection traffic counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub send_messages: u64,
    pub recv_messages: u64,
    pub send_bytes: u64,
    pub recv_bytes: u64,
}

/// Client session state
///
/// Owns the carry-over buffers for both directions, so partial messages
/// never leak from one session into the next.
#[derive(Debug)]
pub struct Connection {
    id: String,
    send: PendingBuffer,
    recv: PendingBuffer,
    stats: ConnectionStats,
}

impl Connection {
    /// Create the session with sequence number `seq`
    pub fn new(seq: u64) -> Self {
        Self {
            id: seq.to_string(),
            send: PendingBuffer::new(),
            recv: PendingBuffer::new(),
            stats: ConnectionStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Frame one non-empty read and log the messages it completed
    ///
    /// Returns the number of records appended.
    pub fn observe(&mut self, log: &mut DataLog, direction: Direction, data: &[u8]) -> Result<u64> {
        if data.is_empty() {
            return self.flush(log, direction);
        }

        let messages = self.buffer(direction).push(data);
        for message in &messages {
            log.append(&self.id, direction, message)?;
        }

        let count = messages.len() as u64;
        match direction {
            Direction::Send => {
                self.stats.send_bytes += data.len() as u64;
                self.stats.send_messages += count;
            }
            Direction::Recv => {
                self.stats.recv_bytes += data.len() as u64;
                self.stats.recv_messages += count;
            }
        }

        Ok(count)
    }

    /// Log any unterminated bytes for `direction` as a final message
    pub fn flush(&mut self, log: &mut DataLog, direction: Direction) -> Result<u64> {
        let Some(message) = self.buffer(direction).finish() else {
            return Ok(0);
        };

        log.append(&self.id, direction, &message)?;
        match direction {
            Direction::Send => self.stats.send_messages += 1,
            Direction::Recv => self.stats.recv_messages += 1,
        }

        Ok(1)
    }

    /// Bytes still waiting for a terminator in `direction`
    pub fn pending(&self, direction: Direction) -> usize {
        match direction {
            Direction::Send => self.send.len(),
            Direction::Recv => self.recv.len(),
        }
    }

    fn buffer(&mut self, direction: Direction) -> &mut PendingBuffer {
        match direction {
            Direction::Send => &mut self.send,
            Direction::Recv => &mut self.recv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::data_log::LogReader;
    use tempfile::tempdir;

    #[test]
    fn test_sequential_ids() {
        assert_eq!(Connection::new(0).id(), "0");
        assert_eq!(Connection::new(41).id(), "41");
    }

    #[test]
    fn test_observe_and_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        let mut log = DataLog::create(&path).unwrap();

        let mut conn = Connection::new(3);
        assert_eq!(conn.observe(&mut log, Direction::Send, b"UPDATE a ").unwrap(), 0);
        assert_eq!(conn.pending(Direction::Send), 9);
        assert_eq!(conn.observe(&mut log, Direction::Send, b"N:1\nFLU").unwrap(), 1);
        assert_eq!(conn.observe(&mut log, Direction::Recv, b"0 Ok\n").unwrap(), 1);
        assert_eq!(conn.flush(&mut log, Direction::Send).unwrap(), 1);
        assert_eq!(conn.flush(&mut log, Direction::Send).unwrap(), 0);

        let stats = conn.stats();
        assert_eq!(stats.send_messages, 2);
        assert_eq!(stats.send_bytes, 16);
        assert_eq!(stats.recv_messages, 1);
        assert_eq!(stats.recv_bytes, 5);

        let payloads: Vec<Vec<u8>> = LogReader::open(&path)
            .unwrap()
            .records()
            .unwrap()
            .map(|r| r.unwrap().payload().unwrap())
            .collect();
        assert_eq!(
            payloads,
            vec![b"UPDATE a N:1\n".to_vec(), b"0 Ok\n".to_vec(), b"FLU".to_vec()]
        );
    }

    #[test]
    fn test_directions_are_independent() {
        let dir = tempdir().unwrap();
        let mut log = DataLog::create(dir.path().join("datalog.jsonl")).unwrap();

        let mut conn = Connection::new(0);
        conn.observe(&mut log, Direction::Send, b"half").unwrap();
        conn.observe(&mut log, Direction::Recv, b"other\n").unwrap();
        assert_eq!(conn.pending(Direction::Send), 4);
        assert_eq!(conn.pending(Direction::Recv), 0);
    }
}
