// src/interception/relay.rs
//! Bidirectional relay between one client and the shared daemon connection
//!
//! Each readiness event reads at most `chunk_size` bytes from whichever side
//! is ready. The bytes are framed and logged first, then forwarded verbatim,
//! so the log order matches the order the relay observed on the wire.
//!
//! ```text
//! client ──read──▶ log(send) ──write_all──▶ daemon
//! client ◀──write_all── log(recv) ◀──read── daemon
//! ```
//!
//! Client end-of-stream or a failed write back to the client ends only the
//! current connection. Daemon end-of-stream is fatal: the daemon connection
//! is shared by every client and cannot be re-established transparently.

use crate::interception::connection::Connection;
use crate::recording::data_log::{DataLog, Direction};
use crate::utils::errors::{Result, SpyError};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// How a client connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// Client closed its end of the stream
    ClientClosed,

    /// Client went away while we were talking to it
    ClientGone,

    /// Shutdown was requested
    Interrupted,
}

enum Event {
    Client(io::Result<usize>),
    Daemon(io::Result<usize>),
    Shutdown,
}

/// Relay owning the persistent daemon connection
#[derive(Debug)]
pub struct Relay<D> {
    daemon: D,
    chunk_size: usize,
}

impl<D> Relay<D>
where
    D: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established daemon connection
    pub fn new(daemon: D, chunk_size: usize) -> Self {
        Self {
            daemon,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Relay one client connection until it ends
    ///
    /// Returns `Err(SpyError::DaemonDisconnected)` if the daemon closes, and
    /// any data log failure unchanged; both are fatal for the caller.
    pub async fn serve<C>(
        &mut self,
        conn: &mut Connection,
        mut client: C,
        log: &mut DataLog,
        shutdown: &CancellationToken,
    ) -> Result<ConnectionEnd>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let mut client_buf = vec![0u8; self.chunk_size];
        let mut daemon_buf = vec![0u8; self.chunk_size];

        let end = loop {
            let event = tokio::select! {
                read = client.read(&mut client_buf) => Event::Client(read),
                read = self.daemon.read(&mut daemon_buf) => Event::Daemon(read),
                _ = shutdown.cancelled() => Event::Shutdown,
            };

            match event {
                Event::Client(Ok(0)) => {
                    debug!(id = conn.id(), "Client closed the connection");
                    break ConnectionEnd::ClientClosed;
                }
                Event::Client(Ok(n)) => {
                    let data = &client_buf[..n];
                    trace!(id = conn.id(), len = n, ">> {}", String::from_utf8_lossy(data));
                    conn.observe(log, Direction::Send, data)?;
                    write_all(&mut self.daemon, data)
                        .await
                        .map_err(|e| SpyError::DaemonIo(format!("write failed: {}", e)))?;
                }
                Event::Client(Err(e)) => {
                    debug!(id = conn.id(), "Client read failed: {}", e);
                    break ConnectionEnd::ClientGone;
                }
                Event::Daemon(Ok(0)) => {
                    conn.flush(log, Direction::Recv)?;
                    conn.flush(log, Direction::Send)?;
                    return Err(SpyError::DaemonDisconnected);
                }
                Event::Daemon(Ok(n)) => {
                    let data = &daemon_buf[..n];
                    trace!(id = conn.id(), len = n, "<< {:?}", String::from_utf8_lossy(data));
                    conn.observe(log, Direction::Recv, data)?;
                    if let Err(e) = write_all(&mut client, data).await {
                        debug!(id = conn.id(), "Client write failed: {}", e);
                        break ConnectionEnd::ClientGone;
                    }
                }
                Event::Daemon(Err(e)) => {
                    return Err(SpyError::DaemonIo(format!("read failed: {}", e)));
                }
                Event::Shutdown => break ConnectionEnd::Interrupted,
            }
        };

        conn.flush(log, Direction::Send)?;
        conn.flush(log, Direction::Recv)?;

        Ok(end)
    }

    /// Read bytes the daemon sends while no client is connected
    ///
    /// Cancel safe. End-of-stream is reported as `DaemonDisconnected`.
    pub async fn read_unsolicited(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self
            .daemon
            .read(&mut buf)
            .await
            .map_err(|e| SpyError::DaemonIo(format!("read failed: {}", e)))?;

        if n == 0 {
            return Err(SpyError::DaemonDisconnected);
        }

        buf.truncate(n);
        Ok(buf)
    }
}

/// Write every byte, retrying partial writes
async fn write_all<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}
