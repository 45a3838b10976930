// src/executor/record.rs
//! Record mode: intercept the daemon socket and log every message
//!
//! Startup order is fixed: open the data log, move the daemon's socket
//! aside, connect to it, then bind the substitute listener at the freed
//! canonical path. Whatever happens after the socket was moved aside, the
//! socket is renamed back before [`run_record`] returns.

use crate::interception::connection::{Connection, ConnectionStats};
use crate::interception::relay::{ConnectionEnd, Relay};
use crate::interception::socket_swap::SocketSwap;
use crate::recording::data_log::{DataLog, Direction};
use crate::utils::config::SpyConfig;
use crate::utils::errors::{Result, SpyError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Record mode settings
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Canonical socket path to intercept
    pub target: PathBuf,

    /// Data log to append to
    pub log_path: PathBuf,

    /// Optional file receiving our PID for the run's duration
    pub pidfile: Option<PathBuf>,

    /// Maximum bytes read per readiness event
    pub chunk_size: usize,

    /// Suffix for the aside socket path
    pub aside_suffix: String,
}

impl RecordOptions {
    /// Build options for `target` from the loaded configuration
    pub fn from_config(target: PathBuf, pidfile: Option<PathBuf>, config: &SpyConfig) -> Self {
        Self {
            target,
            log_path: config.log_path.clone(),
            pidfile,
            chunk_size: config.chunk_size,
            aside_suffix: config.aside_suffix.clone(),
        }
    }
}

/// Totals for a recording session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub connections: u64,
    pub send_messages: u64,
    pub recv_messages: u64,
    pub send_bytes: u64,
    pub recv_bytes: u64,
}

impl RecordSummary {
    fn absorb(&mut self, stats: &ConnectionStats) {
        self.send_messages += stats.send_messages;
        self.recv_messages += stats.recv_messages;
        self.send_bytes += stats.send_bytes;
        self.recv_bytes += stats.recv_bytes;
    }
}

/// Run a recording session until shutdown or a fatal error
pub async fn run_record(options: &RecordOptions, shutdown: CancellationToken) -> Result<RecordSummary> {
    let mut log = DataLog::create(&options.log_path)?;
    let _pidfile = match &options.pidfile {
        Some(path) => Some(PidFile::create(path)?),
        None => None,
    };

    let swap = SocketSwap::intercept(&options.target, &options.aside_suffix)?;
    let outcome = serve(&swap, &mut log, options.chunk_size, &shutdown).await;
    let restored = swap.restore();

    match (outcome, restored) {
        (Ok(summary), Ok(())) => {
            info!(
                connections = summary.connections,
                records = log.records_written(),
                log = ?log.path(),
                "Recording finished"
            );
            Ok(summary)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            error!("{}", restore_err);
            Err(e)
        }
    }
}

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors
fn accept_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(10);
    ACCEPT_BACKOFF_BASE.saturating_mul(factor).min(ACCEPT_BACKOFF_MAX)
}

enum Idle {
    Accepted(std::io::Result<UnixStream>),
    Unsolicited(Result<Vec<u8>>),
    Shutdown,
}

async fn serve(
    swap: &SocketSwap,
    log: &mut DataLog,
    chunk_size: usize,
    shutdown: &CancellationToken,
) -> Result<RecordSummary> {
    let daemon = UnixStream::connect(swap.aside()).await.map_err(|e| {
        SpyError::DaemonConnectFailed(format!("{}: {}", swap.aside().display(), e))
    })?;
    info!("Connected to daemon at {:?}", swap.aside());

    let listener = UnixListener::bind(swap.canonical()).map_err(|e| {
        SpyError::InterceptionFailed(format!(
            "Failed to bind {}: {}",
            swap.canonical().display(),
            e
        ))
    })?;
    info!("Listening on {:?}", swap.canonical());

    let mut relay = Relay::new(daemon, chunk_size);
    let mut summary = RecordSummary::default();
    let mut last: Option<Connection> = None;
    let mut accept_failures: u32 = 0;

    loop {
        let event = tokio::select! {
            accepted = listener.accept() => Idle::Accepted(accepted.map(|(stream, _)| stream)),
            data = relay.read_unsolicited() => Idle::Unsolicited(data),
            _ = shutdown.cancelled() => Idle::Shutdown,
        };

        match event {
            Idle::Accepted(Ok(stream)) => {
                accept_failures = 0;
                let mut conn = Connection::new(summary.connections);
                summary.connections += 1;
                info!(id = conn.id(), "Accepted connection");

                let end = relay.serve(&mut conn, stream, log, shutdown).await;
                summary.absorb(conn.stats());
                let end = match end {
                    Ok(end) => end,
                    Err(e) => {
                        if e.is_fatal_daemon_loss() {
                            error!(id = conn.id(), "Lost daemon connection: {}", e);
                        }
                        return Err(e);
                    }
                };

                info!(id = conn.id(), ?end, "Connection closed");
                last = Some(conn);

                if end == ConnectionEnd::Interrupted {
                    break;
                }
            }
            Idle::Accepted(Err(e)) => {
                accept_failures = accept_failures.saturating_add(1);
                let delay = accept_backoff(accept_failures);
                warn!(failures = accept_failures, ?delay, "Failed to accept connection: {}", e);

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => {}
                }
            }
            Idle::Unsolicited(data) => {
                let data = data?;
                match last.as_mut() {
                    Some(conn) => {
                        warn!(id = conn.id(), len = data.len(), "Daemon sent data between connections");
                        let logged = conn.observe(log, Direction::Recv, &data)?;
                        summary.recv_messages += logged;
                        summary.recv_bytes += data.len() as u64;
                    }
                    None => {
                        warn!(len = data.len(), "Discarding daemon data received before any connection");
                    }
                }
            }
            Idle::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    if let Some(conn) = last.as_mut() {
        summary.recv_messages += conn.flush(log, Direction::Recv)?;
    }

    Ok(summary)
}

/// PID file removed when dropped
#[derive(Debug)]
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn create(path: &Path) -> Result<Self> {
        fs::write(path, std::process::id().to_string()).map_err(|e| {
            SpyError::PidFileFailed(format!("{}: {}", path.display(), e))
        })?;
        debug!("Wrote pidfile {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove pidfile {:?}: {}", self.path, e);
        }
    }
}

/// Cancel `token` on SIGINT, SIGTERM or SIGHUP
pub fn shutdown_on_signals(token: CancellationToken) -> Result<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sighup.recv() => info!("Received SIGHUP"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    });

    debug!("Signal handlers installed");
    Ok(handle)
}
