// src/executor/decipher.rs
//! Decipher mode: render a data log as text, offline
//!
//! Payloads are re-framed per connection and direction, so a message that
//! was split across several records prints as one line. Output format:
//!
//! ```text
//! >> [0] UPDATE /tmp/x.rrd N:1
//! << [0] 0 Ok
//! << [1] <unreadable: 16 bytes>
//! ```

use crate::recording::codec::{render, Rendering};
use crate::recording::data_log::{Direction, LogReader};
use crate::recording::framer::PendingBuffer;
use crate::utils::errors::{Result, SpyError};
use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

/// Totals for a decipher run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecipherSummary {
    pub records: u64,
    pub messages: u64,
    pub unreadable: u64,
}

type StreamKey = (String, Direction);

/// Render every message in the log to `out`
pub fn decipher<W: Write>(reader: &LogReader, out: &mut W) -> Result<DecipherSummary> {
    let mut summary = DecipherSummary::default();
    let mut pending: HashMap<StreamKey, PendingBuffer> = HashMap::new();
    let mut order: Vec<StreamKey> = Vec::new();

    let mut records = reader.records()?;
    while let Some(record) = records.next() {
        let record = record?;
        summary.records += 1;

        let payload = record.payload().map_err(|e| SpyError::LogFormat {
            line: records.line_number(),
            reason: e.to_string(),
        })?;
        if payload.is_empty() {
            continue;
        }

        let key = (record.id.clone(), record.direction);
        let buffer = pending.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            PendingBuffer::new()
        });

        for message in buffer.push(&payload) {
            write_message(out, &record.id, record.direction, &message, &mut summary)?;
        }
    }

    // End of log is end of stream for every connection
    for (id, direction) in &order {
        if let Some(message) = pending.get_mut(&(id.clone(), *direction)).and_then(PendingBuffer::finish) {
            write_message(out, id, *direction, &message, &mut summary)?;
        }
    }

    out.flush()?;
    debug!(
        records = summary.records,
        messages = summary.messages,
        unreadable = summary.unreadable,
        "Decipher finished"
    );

    Ok(summary)
}

fn write_message<W: Write>(
    out: &mut W,
    id: &str,
    direction: Direction,
    message: &[u8],
    summary: &mut DecipherSummary,
) -> Result<()> {
    summary.messages += 1;
    match render(message) {
        Rendering::Text(text) => writeln!(out, "{} [{}] {}", direction.prompt(), id, text)?,
        Rendering::Unreadable { len } => {
            summary.unreadable += 1;
            writeln!(out, "{} [{}] <unreadable: {} bytes>", direction.prompt(), id, len)?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::data_log::DataLog;
    use tempfile::tempdir;

    fn run(path: &std::path::Path) -> (String, DecipherSummary) {
        let reader = LogReader::open(path).unwrap();
        let mut out = Vec::new();
        let summary = decipher(&reader, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_decipher_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        let mut log = DataLog::create(&path).unwrap();
        log.append("0", Direction::Send, b"UPDATE /tmp/x.rrd N:1\n").unwrap();
        log.append("0", Direction::Recv, b"0 Ok\n").unwrap();

        let (text, summary) = run(&path);
        assert_eq!(text, ">> [0] UPDATE /tmp/x.rrd N:1\n<< [0] 0 Ok\n");
        assert_eq!(summary.records, 2);
        assert_eq!(summary.messages, 2);
        assert_eq!(summary.unreadable, 0);
    }

    #[test]
    fn test_records_spanning_a_line_are_merged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        let mut log = DataLog::create(&path).unwrap();
        log.append("0", Direction::Send, b"UPDATE /tmp/x").unwrap();
        log.append("0", Direction::Recv, b"0 Ok\n").unwrap();
        log.append("0", Direction::Send, b".rrd N:1\nFLUSH ").unwrap();
        log.append("0", Direction::Send, b"/tmp/x.rrd\n").unwrap();

        let (text, summary) = run(&path);
        assert_eq!(
            text,
            "<< [0] 0 Ok\n>> [0] UPDATE /tmp/x.rrd N:1\n>> [0] FLUSH /tmp/x.rrd\n"
        );
        assert_eq!(summary.messages, 3);
    }

    #[test]
    fn test_connections_do_not_share_buffers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        let mut log = DataLog::create(&path).unwrap();
        log.append("0", Direction::Send, b"dangling").unwrap();
        log.append("1", Direction::Send, b"STATS\n").unwrap();

        let (text, _) = run(&path);
        assert_eq!(text, ">> [1] STATS\n>> [0] dangling\n");
    }

    #[test]
    fn test_unreadable_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        let mut log = DataLog::create(&path).unwrap();
        log.append("2", Direction::Recv, &[0x00, 0xf0, 0x3f, 0xff, b'\n']).unwrap();

        let (text, summary) = run(&path);
        assert_eq!(text, "<< [2] <unreadable: 5 bytes>\n");
        assert_eq!(summary.unreadable, 1);
    }

    #[test]
    fn test_corrupted_payload_is_a_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"0\",\"type\":\"send\",\"message\":\"***\",\"time\":1.0}\n",
        )
        .unwrap();

        let reader = LogReader::open(&path).unwrap();
        let result = decipher(&reader, &mut Vec::new());
        assert!(matches!(result, Err(SpyError::LogFormat { line: 1, .. })));
    }
}
