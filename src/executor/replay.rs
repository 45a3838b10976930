// src/executor/replay.rs
//! Replay mode: re-inject recorded client traffic against a live socket
//!
//! `send` records are written verbatim. Each `recv` record triggers exactly
//! one blocking read whose length is reported but never compared with the
//! recording; replay exercises the daemon, it does not assert reproduction.
//!
//! Reads are not realigned with recorded line boundaries: a multi-line reply
//! the daemon sends in one write satisfies only the first of its `recv`
//! records, and the next read waits for more data.

use crate::recording::data_log::{Direction, LogReader};
use crate::utils::errors::{Result, SpyError};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info, trace};

/// Totals for a replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub sent_messages: u64,
    pub sent_bytes: u64,
    pub reads: u64,
    pub received_bytes: u64,
}

/// Connect to `target` and replay the log
pub async fn run_replay(reader: &LogReader, target: &Path, chunk_size: usize) -> Result<ReplaySummary> {
    let stream = UnixStream::connect(target)
        .await
        .map_err(|e| SpyError::DaemonConnectFailed(format!("{}: {}", target.display(), e)))?;
    info!("Connected to {:?}", target);

    let summary = replay(reader, stream, chunk_size).await?;
    info!(
        sent = summary.sent_messages,
        reads = summary.reads,
        "Replay finished"
    );
    Ok(summary)
}

/// Replay the log over an established stream
pub async fn replay<S>(reader: &LogReader, mut stream: S, chunk_size: usize) -> Result<ReplaySummary>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut buf = vec![0u8; chunk_size.max(1)];

    for (index, record) in reader.records()?.enumerate() {
        let record = record?;

        match record.direction {
            Direction::Send => {
                let payload = record.payload()?;
                trace!(record = index, id = %record.id, len = payload.len(), "sending");
                stream
                    .write_all(&payload)
                    .await
                    .map_err(|e| SpyError::ReplayFailed(format!("record {}: write failed: {}", index + 1, e)))?;
                summary.sent_messages += 1;
                summary.sent_bytes += payload.len() as u64;
            }
            Direction::Recv => {
                let n = stream
                    .read(&mut buf)
                    .await
                    .map_err(|e| SpyError::ReplayFailed(format!("record {}: read failed: {}", index + 1, e)))?;
                if n == 0 {
                    return Err(SpyError::DaemonDisconnected);
                }

                let recorded = record.payload().map(|p| p.len()).ok();
                debug!(record = index, id = %record.id, received = n, ?recorded, "received");
                summary.reads += 1;
                summary.received_bytes += n as u64;
            }
        }
    }

    Ok(summary)
}
