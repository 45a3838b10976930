// src/main.rs
//! rrd-spy command line
//!
//! Records traffic on the rrdcached socket, replays it against a live
//! daemon, or prints a recorded session as text.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rrd_spy::executor::{decipher, run_record, run_replay, shutdown_on_signals, RecordOptions};
use rrd_spy::observability::init_tracing;
use rrd_spy::recording::LogReader;
use rrd_spy::utils::config::{SpyConfig, DEFAULT_LOG_PATH};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rrd-spy", version, about = "Record, replay and decipher rrdcached socket traffic")]
struct Arguments {
    #[command(subcommand)]
    command: Command,

    /// Increase diagnostic output (-v info, -vv debug, -vvv IO tracing)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./rrd-spy.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Intercept the socket at TARGET and record all traffic
    Record {
        /// Socket path clients connect to
        #[arg(long)]
        target: PathBuf,

        /// Write our PID here while recording
        #[arg(long)]
        pidfile: Option<PathBuf>,
    },

    /// Send recorded client traffic to the socket at TARGET
    Replay {
        /// Socket path of a live daemon
        #[arg(long)]
        target: PathBuf,

        /// Data log to replay
        #[arg(long, default_value = DEFAULT_LOG_PATH)]
        log: PathBuf,
    },

    /// Print a recorded log as text
    Decipher {
        /// Data log to read
        #[arg(long, default_value = DEFAULT_LOG_PATH)]
        log: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let arguments = Arguments::parse();

    match run(arguments).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(arguments: Arguments) -> Result<()> {
    let config = SpyConfig::load_from(arguments.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(arguments.verbose, config.log_format)?;

    info!("Starting rrd-spy v{}", rrd_spy::VERSION);

    match arguments.command {
        Command::Record { target, pidfile } => {
            let options = RecordOptions::from_config(target, pidfile, &config);
            let token = CancellationToken::new();
            let signals = shutdown_on_signals(token.clone())?;

            let outcome = run_record(&options, token.clone()).await;
            token.cancel();
            let _ = signals.await;

            let summary = outcome.with_context(|| format!("Recording {} failed", options.target.display()))?;
            info!(
                connections = summary.connections,
                send = summary.send_messages,
                recv = summary.recv_messages,
                "Recorded session"
            );
        }
        Command::Replay { target, log } => {
            let reader = LogReader::open(&log)?;
            let summary = run_replay(&reader, &target, config.chunk_size)
                .await
                .with_context(|| format!("Replaying {} failed", log.display()))?;
            info!(
                sent = summary.sent_messages,
                sent_bytes = summary.sent_bytes,
                reads = summary.reads,
                received_bytes = summary.received_bytes,
                "Replayed session"
            );
        }
        Command::Decipher { log } => {
            let reader = LogReader::open(&log)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let summary = decipher(&reader, &mut out)
                .with_context(|| format!("Deciphering {} failed", log.display()))?;
            info!(
                records = summary.records,
                messages = summary.messages,
                unreadable = summary.unreadable,
                "Deciphered log"
            );
        }
    }

    Ok(())
}
