//! Line-oriented viewer for pipes and scripts

use std::io::{self, Write};

use kshark_core::{LogEvent, OrderedLog, Session};
use tokio::sync::mpsc;
use tracing::info;

use crate::capture::CaptureMessage;
use crate::ingest::{capture_outcome, handle_message, Flow};

/// How each log entry is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `state title`, one line per entry change
    Text,
    /// The pair as one JSON object per line
    Json,
}

/// Writes one line per appended or updated log entry
pub struct LinePrinter<W> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> LinePrinter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn print(&mut self, event: LogEvent, log: &OrderedLog) -> io::Result<()> {
        let Some(pair) = event.index().and_then(|index| log.get(index)) else {
            return Ok(());
        };

        match self.format {
            OutputFormat::Text => {
                writeln!(self.out, "{:<7} {}", pair.state().name(), pair.title())?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, pair)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Consume the capture channel until it ends, printing to stdout
pub async fn run(
    mut rx: mpsc::Receiver<CaptureMessage>,
    format: OutputFormat,
    skip_malformed: bool,
) -> anyhow::Result<()> {
    let mut session: Session = Session::default();
    let mut printer = LinePrinter::new(io::stdout().lock(), format);

    while let Some(message) = rx.recv().await {
        let flow = handle_message(&mut session, message, skip_malformed)?;

        for event in session.correlator_mut().drain_events() {
            printer.print(event, session.correlator().log())?;
        }

        if let Flow::Ended(result) = flow {
            let correlator = session.correlator();
            info!(
                "Capture ended with {} entries, {} requests unanswered",
                correlator.pairs().len(),
                correlator.pending_len()
            );
            return capture_outcome(result);
        }
    }

    Ok(())
}
