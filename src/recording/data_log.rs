// src/recording/data_log.rs
//! Append-only JSON-lines data log
//!
//! Each line is one self-contained [`LogRecord`]:
//!
//! ```text
//! {"id":"0","type":"send","message":"VVBEQVRFIC90bXAveC5ycmQgTjoxCg==","time":1700000000.25}
//! ```
//!
//! The writer keeps the file open for the whole recording and pushes every
//! record to the OS before returning, so a fatal error later in the run
//! cannot lose records that were already reported as written.

use crate::recording::codec;
use crate::utils::errors::{Result, SpyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Direction of a transfer as seen from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Client to daemon
    Send,

    /// Daemon to client
    Recv,
}

impl Direction {
    /// Prompt used when printing messages
    pub fn prompt(&self) -> &'static str {
        match self {
            Direction::Send => ">>",
            Direction::Recv => "<<",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Recv => f.write_str("recv"),
        }
    }
}

/// One recorded transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Connection identifier
    pub id: String,

    /// Transfer direction
    #[serde(rename = "type")]
    pub direction: Direction,

    /// Base64-encoded payload
    pub message: String,

    /// Wall-clock time of observation (unix seconds)
    pub time: f64,
}

impl LogRecord {
    /// Build a record stamped with the current time
    pub fn new(id: &str, direction: Direction, payload: &[u8]) -> Self {
        Self {
            id: id.to_string(),
            direction,
            message: codec::encode(payload),
            time: unix_now(),
        }
    }

    /// Decode the stored payload
    pub fn payload(&self) -> Result<Vec<u8>> {
        codec::decode(&self.message)
    }
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Write side of the data log
#[derive(Debug)]
pub struct DataLog {
    path: PathBuf,
    file: File,
    records_written: u64,
}

impl DataLog {
    /// Open (or create) the log for appending
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SpyError::LogOpen(format!("{}: {}", path.display(), e)))?;

        info!("Recording to {:?}", path);

        Ok(Self {
            path,
            file,
            records_written: 0,
        })
    }

    /// Append one record
    pub fn append(&mut self, connection_id: &str, direction: Direction, payload: &[u8]) -> Result<()> {
        let record = LogRecord::new(connection_id, direction, payload);

        let mut line = serde_json::to_vec(&record)
            .map_err(|e| SpyError::LogWrite(format!("Serialization error: {}", e)))?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .map_err(|e| SpyError::LogWrite(format!("{}: {}", self.path.display(), e)))?;

        self.records_written += 1;
        trace!(id = connection_id, %direction, len = payload.len(), "logged message");

        Ok(())
    }

    /// Number of records appended by this writer
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read side of the data log
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    /// Open an existing log
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(SpyError::LogOpen(format!("{}: no such file", path.display())));
        }

        debug!("Reading data log {:?}", path);
        Ok(Self { path })
    }

    /// Iterate records in file order, starting from the top each call
    pub fn records(&self) -> Result<Records> {
        let file = File::open(&self.path)
            .map_err(|e| SpyError::LogOpen(format!("{}: {}", self.path.display(), e)))?;

        Ok(Records {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            failed: false,
        })
    }
}

/// Lazy record iterator
///
/// Stops after the first malformed line.
#[derive(Debug)]
pub struct Records {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    failed: bool,
}

impl Records {
    /// File line of the record most recently returned
    pub fn line_number(&self) -> usize {
        self.line_no
    }
}

impl Iterator for Records {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let parsed = line
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    if text.trim().is_empty() {
                        Ok(None)
                    } else {
                        serde_json::from_str::<LogRecord>(&text)
                            .map(Some)
                            .map_err(|e| e.to_string())
                    }
                });

            match parsed {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(reason) => {
                    self.failed = true;
                    return Some(Err(SpyError::LogFormat {
                        line: self.line_no,
                        reason,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");

        let mut log = DataLog::create(&path).unwrap();
        log.append("0", Direction::Send, b"UPDATE /tmp/x.rrd N:1\n").unwrap();
        log.append("0", Direction::Recv, b"0 Ok\n").unwrap();
        assert_eq!(log.records_written(), 2);

        let reader = LogReader::open(&path).unwrap();
        let records: Vec<_> = reader.records().unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "0");
        assert_eq!(records[0].direction, Direction::Send);
        assert_eq!(records[0].payload().unwrap(), b"UPDATE /tmp/x.rrd N:1\n");
        assert_eq!(records[1].direction, Direction::Recv);
        assert_eq!(records[1].payload().unwrap(), b"0 Ok\n");
        assert!(records[0].time <= records[1].time);
    }

    #[test]
    fn test_wire_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");

        let mut log = DataLog::create(&path).unwrap();
        log.append("7", Direction::Recv, b"0 Ok\n").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(value["type"], "recv");
        assert_eq!(value["message"], "MCBPawo=");
        assert!(value["time"].as_f64().unwrap() > 1_000_000_000.0);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_append_is_cumulative_across_writers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");

        DataLog::create(&path).unwrap().append("0", Direction::Send, b"a\n").unwrap();
        DataLog::create(&path).unwrap().append("1", Direction::Send, b"b\n").unwrap();

        let reader = LogReader::open(&path).unwrap();
        let ids: Vec<String> = reader.records().unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn test_records_are_restartable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");

        let mut log = DataLog::create(&path).unwrap();
        log.append("0", Direction::Send, b"a\n").unwrap();
        log.append("0", Direction::Send, b"b\n").unwrap();

        let reader = LogReader::open(&path).unwrap();
        let mut first = reader.records().unwrap();
        assert!(first.next().is_some());

        assert_eq!(reader.records().unwrap().count(), 2);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"0\",\"type\":\"send\",\"message\":\"YQo=\",\"time\":1.0}\n\n",
        )
        .unwrap();

        let reader = LogReader::open(&path).unwrap();
        assert_eq!(reader.records().unwrap().count(), 1);
    }

    #[test]
    fn test_malformed_line_aborts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datalog.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"id\":\"0\",\"type\":\"send\",\"message\":\"YQo=\",\"time\":1.0}\n",
                "{\"id\":\"0\",\"type\":\"sideways\",\"message\":\"YQo=\",\"time\":1.0}\n",
                "{\"id\":\"0\",\"type\":\"recv\",\"message\":\"YQo=\",\"time\":1.0}\n",
            ),
        )
        .unwrap();

        let reader = LogReader::open(&path).unwrap();
        let results: Vec<_> = reader.records().unwrap().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SpyError::LogFormat { line: 2, .. })));
    }

    #[test]
    fn test_append_failure_is_log_write() {
        let mut log = DataLog::create("/dev/full").unwrap();
        let result = log.append("0", Direction::Send, b"STATS\n");

        assert!(matches!(result, Err(SpyError::LogWrite(_))));
        assert_eq!(log.records_written(), 0);
    }

    #[test]
    fn test_open_missing_log() {
        let dir = tempdir().unwrap();
        let result = LogReader::open(dir.path().join("missing.jsonl"));
        assert!(matches!(result, Err(SpyError::LogOpen(_))));
    }

    #[test]
    fn test_direction_prompt() {
        assert_eq!(Direction::Send.prompt(), ">>");
        assert_eq!(Direction::Recv.prompt(), "<<");
        assert_eq!(Direction::Recv.to_string(), "recv");
    }
}
