//! Consumer side of the capture channel

use std::process::ExitStatus;

use anyhow::anyhow;
use kshark_core::{EventSink, Session, ShapeError};
use tracing::warn;

use crate::capture::{CaptureError, CaptureMessage};

/// What the consumer loop should do after a message
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// Capture is over; no more messages will arrive
    Ended(Result<Option<ExitStatus>, CaptureError>),
}

/// Apply one capture message to the session
///
/// A [`ShapeError`] is returned to the caller unless `skip_malformed` is set,
/// in which case it is logged and the packet dropped.
pub fn handle_message<S: EventSink>(
    session: &mut Session<S>,
    message: CaptureMessage,
    skip_malformed: bool,
) -> Result<Flow, ShapeError> {
    match message {
        CaptureMessage::Packet(packet) => match session.ingest_packet(&packet) {
            Ok(_) => Ok(Flow::Continue),
            Err(e) if skip_malformed => {
                warn!("Skipping packet: {}", e);
                Ok(Flow::Continue)
            }
            Err(e) => Err(e),
        },
        CaptureMessage::Ended(result) => Ok(Flow::Ended(result)),
    }
}

/// Turn the end of a capture into the process result
pub fn capture_outcome(result: Result<Option<ExitStatus>, CaptureError>) -> anyhow::Result<()> {
    match result? {
        Some(status) if !status.success() => Err(anyhow!("tshark exited with {}", status)),
        _ => Ok(()),
    }
}
