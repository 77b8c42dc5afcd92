//! kafka-shark
//!
//! Runs tshark, pairs each Kafka request with its response and shows the
//! resulting log in a terminal dashboard (or prints it line by line).

mod capture;
mod cli;
mod dashboard;
mod headless;
mod ingest;
mod status_layer;

use std::fs::File;
use std::sync::{mpsc, Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use capture::{spawn_capture, CaptureMessage, CHANNEL_CAPACITY};
use cli::Cli;
use headless::OutputFormat;
use status_layer::{StatusFilter, StatusLayer, StatusLevel, StatusMessage};

/// Log output directives used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "kafka_shark=info,kshark_core=info,kshark_pdml=info";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Status channel exists before the subscriber so startup events reach it
    let (status_tx, status_rx) = mpsc::channel::<StatusMessage>();
    let status_level = Arc::new(StatusLevel::new());
    init_tracing(&cli, status_tx, status_level.clone())?;

    tracing::info!("Starting kafka-shark");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let (capture_tx, capture_rx) = tokio_mpsc::channel::<CaptureMessage>(CHANNEL_CAPACITY);
    let _capture = runtime.block_on(spawn_capture(cli.capture_source(), capture_tx))?;

    if cli.headless {
        let format = if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        };
        runtime.block_on(headless::run(capture_rx, format, cli.skip_malformed))
    } else {
        dashboard::run(capture_rx, status_rx, status_level, cli.skip_malformed)
    }
}

/// Install the global subscriber
fn init_tracing(
    cli: &Cli,
    status_tx: mpsc::Sender<StatusMessage>,
    status_level: Arc<StatusLevel>,
) -> anyhow::Result<()> {
    let log_file = match &cli.log_file {
        Some(path) => Some(
            File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?,
        ),
        None => None,
    };
    let status = (!cli.headless).then_some((status_tx, status_level));

    build_subscriber(cli.headless, log_file, status).init();
    Ok(())
}

/// Compose the logging layers
///
/// Logs go to stderr in headless mode. The dashboard owns the terminal, so
/// there logs only go to the log file and, for workspace crates, to the
/// status line. `RUST_LOG` filters the log outputs only; the status line has
/// its own level.
fn build_subscriber(
    headless: bool,
    log_file: Option<File>,
    status: Option<(mpsc::Sender<StatusMessage>, Arc<StatusLevel>)>,
) -> impl Subscriber + Send + Sync + 'static {
    let stderr_layer = headless.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(log_filter())
    });

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(log_filter())
    });

    let status_layer =
        status.map(|(tx, level)| StatusLayer::new(tx).with_filter(StatusFilter::new(level)));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(status_layer)
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
