//! Request/response correlation
//!
//! The correlator classifies each packet view and keeps two structures in
//! step: the [`OrderedLog`] of pairs and an index of requests still waiting
//! for a response, keyed by request frame number.
//!
//! # Preconditions
//!
//! Frame numbers must be unique within a session. tshark guarantees this for
//! a single capture. If a request frame repeats while the earlier request is
//! still pending, the newer request takes over the pending slot and the older
//! pair can no longer be matched.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::events::{EventSink, LogEvent};
use crate::log::{OrderedLog, Pair};
use crate::view::PacketView;

/// What ingesting a packet did to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// A request was appended at `index` and is now pending
    Request { index: usize },
    /// A response completed the pending pair at `index`
    Matched { index: usize },
    /// A response with no pending request was appended at `index`
    Orphan { index: usize },
}

impl Ingested {
    pub fn index(&self) -> usize {
        match self {
            Ingested::Request { index } | Ingested::Matched { index } | Ingested::Orphan { index } => {
                *index
            }
        }
    }
}

/// Pairs requests with responses into an ordered log
pub struct Correlator<S = Vec<LogEvent>> {
    log: OrderedLog,
    /// Request frame -> log index of its unanswered pair
    pending: HashMap<u64, usize>,
    sink: S,
}

impl<S: EventSink> Correlator<S> {
    /// Create an empty correlator reporting to `sink`
    pub fn new(sink: S) -> Self {
        Self {
            log: OrderedLog::new(),
            pending: HashMap::new(),
            sink,
        }
    }

    /// Ingest one packet view
    ///
    /// Requests are appended and become pending. A response completes the
    /// pending pair its `request_frame` points to; a pending entry is consumed
    /// by the first response that cites it, so any later response citing the
    /// same frame becomes an orphan.
    pub fn ingest(&mut self, view: PacketView) -> Ingested {
        if view.is_request() {
            let frame = view.frame;
            let index = self.log.push(Pair::from_request(view));
            if let Some(previous) = self.pending.insert(frame, index) {
                warn!(
                    "duplicate request frame {} (log entries {} and {}), earlier request can no longer match",
                    frame, previous, index
                );
            }
            debug!(frame, index, "request appended");
            self.sink.emit(LogEvent::Appended { index });
            return Ingested::Request { index };
        }

        let frame = view.frame;
        let pending = view
            .request_frame
            .and_then(|request_frame| self.pending.remove(&request_frame));

        let view = match pending {
            Some(index) => match self.log.attach_response(index, view) {
                Ok(()) => {
                    debug!(frame, index, "response matched");
                    self.sink.emit(LogEvent::Updated { index });
                    return Ingested::Matched { index };
                }
                Err(view) => view,
            },
            None => view,
        };

        let index = self.log.push(Pair::orphan(view));
        debug!(frame, index, "orphan response appended");
        self.sink.emit(LogEvent::Appended { index });
        Ingested::Orphan { index }
    }

    /// Wipe the log, the pending index and the selection
    pub fn clear(&mut self) {
        self.log.clear();
        self.pending.clear();
        debug!("log cleared");
        self.sink.emit(LogEvent::Cleared);
    }

    /// Set the viewer selection (clamped to the last entry)
    pub fn set_selection(&mut self, index: usize) {
        self.log.select(index);
    }

    pub fn selection(&self) -> usize {
        self.log.selected()
    }

    pub fn log(&self) -> &OrderedLog {
        &self.log
    }

    pub fn pairs(&self) -> &[Pair] {
        self.log.pairs()
    }

    /// Number of requests still waiting for a response
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the request with this frame number is still waiting
    pub fn is_pending(&self, frame: u64) -> bool {
        self.pending.contains_key(&frame)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl Correlator<Vec<LogEvent>> {
    /// Take all buffered events
    pub fn drain_events(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.sink)
    }
}

impl Default for Correlator<Vec<LogEvent>> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
