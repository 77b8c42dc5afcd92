//! Packet document capture
//!
//! Runs tshark (or replays a saved PDML file) in a spawned task, splits its
//! output into packet documents and forwards them to the consumer loop over a
//! bounded channel. The channel is the only buffer between capture and
//! ingestion.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use kshark_pdml::{Packet, PdmlReader};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Arguments that make tshark emit line-buffered PDML
pub const PDML_ARGS: &[&str] = &["-l", "-T", "pdml"];

/// Pass-through used when no capture arguments are given
pub const DEFAULT_CAPTURE_ARGS: &[&str] = &["-o", "kafka.tcp.ports:9092"];

/// Capacity of the document channel
pub const CHANNEL_CAPACITY: usize = 256;

const READ_CHUNK: usize = 8192;

/// How to start tshark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// tshark executable
    pub tshark: PathBuf,
    /// Arguments appended after the PDML arguments; empty means the default
    pub args: Vec<String>,
}

impl CaptureConfig {
    /// Full tshark argument list
    pub fn tshark_args(&self) -> Vec<String> {
        let extra: Vec<String> = if self.args.is_empty() {
            DEFAULT_CAPTURE_ARGS.iter().map(|s| s.to_string()).collect()
        } else {
            self.args.clone()
        };

        PDML_ARGS
            .iter()
            .map(|s| s.to_string())
            .chain(extra)
            .collect()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tshark: PathBuf::from("tshark"),
            args: Vec::new(),
        }
    }
}

/// Where packet documents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Live tshark process
    Tshark(CaptureConfig),
    /// Saved PDML output
    File(PathBuf),
}

/// Capture failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tshark stdout was not captured")]
    NoStdout,

    #[error("read error: {0}")]
    Read(#[from] std::io::Error),
}

/// Messages from the capture task to the consumer loop
#[derive(Debug)]
pub enum CaptureMessage {
    /// One complete packet document
    Packet(Box<Packet>),
    /// The capture finished; the status is set for tshark captures
    Ended(Result<Option<ExitStatus>, CaptureError>),
}

/// Start capturing from `source`
///
/// Must be called from within a tokio runtime. Failing to start tshark or to
/// open the file is reported here; later failures arrive as
/// [`CaptureMessage::Ended`].
pub async fn spawn_capture(
    source: CaptureSource,
    tx: mpsc::Sender<CaptureMessage>,
) -> Result<JoinHandle<()>, CaptureError> {
    match source {
        CaptureSource::Tshark(config) => {
            let child = spawn_tshark(&config)?;
            Ok(tokio::spawn(run_tshark(child, tx)))
        }
        CaptureSource::File(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|source| CaptureError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
            info!("Replaying {}", path.display());
            Ok(tokio::spawn(async move {
                let result = pump(file, &tx).await.map(|_| None);
                let _ = tx.send(CaptureMessage::Ended(result)).await;
            }))
        }
    }
}

fn spawn_tshark(config: &CaptureConfig) -> Result<Child, CaptureError> {
    let args = config.tshark_args();
    info!("Starting {} {}", config.tshark.display(), args.join(" "));

    Command::new(&config.tshark)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CaptureError::Spawn {
            program: config.tshark.display().to_string(),
            source,
        })
}

async fn run_tshark(mut child: Child, tx: mpsc::Sender<CaptureMessage>) {
    let result: Result<Option<ExitStatus>, CaptureError> = async {
        let stdout = child.stdout.take().ok_or(CaptureError::NoStdout)?;
        if !pump(stdout, &tx).await? {
            // Consumer is gone; kill_on_drop stops tshark
            return Ok(None);
        }
        let status = child.wait().await?;
        if !status.success() {
            warn!("tshark exited with {}", status);
        }
        Ok(Some(status))
    }
    .await;

    let _ = tx.send(CaptureMessage::Ended(result)).await;
}

/// Read `input` to the end, forwarding each packet document
///
/// Malformed documents are logged and skipped. Returns `Ok(false)` if the
/// receiver was dropped before the input ended.
pub async fn pump<R>(mut input: R, tx: &mpsc::Sender<CaptureMessage>) -> Result<bool, CaptureError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = PdmlReader::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut documents = 0u64;

    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        reader.push_bytes(&buf[..n]);

        while let Some(result) = reader.next_packet() {
            match result {
                Ok(packet) => {
                    documents += 1;
                    if tx.send(CaptureMessage::Packet(Box::new(packet))).await.is_err() {
                        return Ok(false);
                    }
                }
                Err(e) => warn!("Skipping malformed packet document: {}", e),
            }
        }
    }

    debug!(
        documents,
        leftover = reader.buffered_len(),
        "capture stream ended"
    );
    Ok(true)
}
