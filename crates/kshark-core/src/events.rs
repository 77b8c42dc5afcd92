//! Notifications from the correlator to its viewers
//!
//! The correlator pushes every log mutation into an [`EventSink`] injected at
//! construction. Viewers re-read the log through the correlator's accessors
//! when they handle an event, so events only carry the affected index.

use std::sync::mpsc;

use tokio::sync::mpsc as tokio_mpsc;

/// A change to the ordered log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A new pair was appended at `index`
    Appended { index: usize },
    /// The pair at `index` received its response
    Updated { index: usize },
    /// The log was wiped
    Cleared,
}

impl LogEvent {
    /// Index of the affected pair, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            LogEvent::Appended { index } | LogEvent::Updated { index } => Some(*index),
            LogEvent::Cleared => None,
        }
    }
}

/// Destination for log notifications
pub trait EventSink {
    fn emit(&mut self, event: LogEvent);
}

/// Buffers events for later draining (tests, polling viewers)
impl EventSink for Vec<LogEvent> {
    fn emit(&mut self, event: LogEvent) {
        self.push(event);
    }
}

impl EventSink for mpsc::Sender<LogEvent> {
    fn emit(&mut self, event: LogEvent) {
        // Ignore errors if the receiver is dropped
        let _ = self.send(event);
    }
}

impl EventSink for tokio_mpsc::UnboundedSender<LogEvent> {
    fn emit(&mut self, event: LogEvent) {
        let _ = self.send(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: LogEvent) {
        (**self).emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: LogEvent) {
        (**self).emit(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: LogEvent) {}
}
