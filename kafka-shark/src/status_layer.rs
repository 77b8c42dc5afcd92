//! Tracing layer feeding the dashboard status line
//!
//! Only events from this workspace's crates reach the status line, and only
//! at or above the level the user picked with `d`. Structured fields are kept
//! as `name=value` after the message so a `debug!(frame, ...)` still says which
//! frame it was about.

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Filter};
use tracing_subscriber::Layer;

/// Crate names whose events may reach the status line
const WORKSPACE_CRATES: &[&str] = &["kafka_shark", "kshark_core", "kshark_pdml"];

/// Levels `d` steps through, starting at the first
const LEVEL_CYCLE: [Level; 3] = [Level::WARN, Level::INFO, Level::DEBUG];

/// Status-line verbosity, shared between the key handler and [`StatusFilter`]
#[derive(Debug, Default)]
pub struct StatusLevel {
    step: AtomicUsize,
}

impl StatusLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Level {
        LEVEL_CYCLE[self.step.load(Ordering::Relaxed) % LEVEL_CYCLE.len()]
    }

    /// Advance to the next level (warn, info, debug, then warn again)
    pub fn cycle(&self) -> Level {
        let previous = self
            .step
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |step| {
                Some((step + 1) % LEVEL_CYCLE.len())
            })
            .unwrap_or_else(|step| step);
        LEVEL_CYCLE[(previous + 1) % LEVEL_CYCLE.len()]
    }
}

fn is_workspace_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    WORKSPACE_CRATES.contains(&krate)
}

/// Last path segment of a target, e.g. `correlator` for `kshark_core::correlator`
fn component_of(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Per-layer filter for [`StatusLayer`]
pub struct StatusFilter {
    level: Arc<StatusLevel>,
}

impl StatusFilter {
    pub fn new(level: Arc<StatusLevel>) -> Self {
        Self { level }
    }
}

impl<S> Filter<S> for StatusFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        is_workspace_target(meta.target()) && *meta.level() <= self.level.current()
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> Interest {
        if !is_workspace_target(meta.target()) {
            Interest::never()
        } else {
            // The level changes at runtime
            Interest::sometimes()
        }
    }
}

/// One event destined for the status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: Level,
    pub component: String,
    pub text: String,
}

impl StatusMessage {
    pub fn summary(&self) -> String {
        format!("{} {}: {}", self.level, self.component, self.text)
    }
}

/// Sends every event it sees to the dashboard over a std channel
pub struct StatusLayer {
    tx: Sender<StatusMessage>,
}

impl StatusLayer {
    pub fn new(tx: Sender<StatusMessage>) -> Self {
        Self { tx }
    }
}

impl<S: Subscriber> Layer<S> for StatusLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut text = TextVisitor::default();
        event.record(&mut text);

        // The dashboard may already be gone during shutdown
        let _ = self.tx.send(StatusMessage {
            level: *meta.level(),
            component: component_of(meta.target()).to_string(),
            text: text.finish(),
        });
    }
}

/// Renders `message name=value ...`
#[derive(Default)]
struct TextVisitor {
    message: String,
    fields: String,
}

impl TextVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for TextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }
}
