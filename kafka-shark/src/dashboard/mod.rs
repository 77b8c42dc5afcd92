//! Terminal dashboard
//!
//! Three stacked panes: the request/response log, the selected request and
//! the selected response. Row titles are maintained from the correlator's
//! [`LogEvent`]s; the detail panes are re-rendered only when the selection
//! moves or the selected entry receives its response.

use std::io;
use std::process::ExitStatus;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use kshark_core::{LogEvent, OrderedLog, PacketView, Pair, SelectorConfig, Session};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::debug;

use crate::capture::{CaptureError, CaptureMessage};
use crate::status_layer::{StatusLevel, StatusMessage};
use crate::ingest::{capture_outcome, handle_message, Flow};

mod ui;

/// Input poll interval, which is also the redraw interval when idle
const TICK: Duration = Duration::from_millis(50);

/// Capture messages ingested per redraw
const MAX_MESSAGES_PER_FRAME: usize = 512;

/// Lines moved by PageUp/PageDown
const PAGE_LINES: u16 = 10;

/// Which detail pane receives scroll keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Request,
    Response,
}

/// What a key press asks the run loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Clear,
    Select(usize),
    CycleStatusLevel,
}

/// Dashboard view state
pub struct Dashboard {
    titles: Vec<String>,
    request_text: String,
    response_text: String,
    /// Selection the detail panes currently show
    shown: Option<usize>,
    detail_stale: bool,
    focus: Focus,
    request_scroll: u16,
    response_scroll: u16,
    status: Option<String>,
    capture: Option<String>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            titles: Vec::new(),
            request_text: String::new(),
            response_text: String::new(),
            shown: None,
            detail_stale: true,
            focus: Focus::Request,
            request_scroll: 0,
            response_scroll: 0,
            status: None,
            capture: None,
        }
    }

    /// Update row titles for one log notification
    pub fn apply_event(&mut self, event: LogEvent, log: &OrderedLog) {
        match event {
            LogEvent::Appended { index } => {
                if index != self.titles.len() {
                    // Missed a notification; rebuild from the log
                    debug!(index, titles = self.titles.len(), "rebuilding log titles");
                    self.titles = log.pairs().iter().map(|pair| pair.title()).collect();
                } else if let Some(pair) = log.get(index) {
                    self.titles.push(pair.title());
                }
            }
            LogEvent::Updated { index } => {
                if let (Some(title), Some(pair)) = (self.titles.get_mut(index), log.get(index)) {
                    *title = pair.title();
                }
                if self.shown == Some(index) {
                    self.detail_stale = true;
                }
            }
            LogEvent::Cleared => {
                self.titles.clear();
                self.detail_stale = true;
            }
        }
    }

    /// Refresh the detail panes if the selection moved or its entry changed
    pub fn sync_detail(&mut self, log: &OrderedLog) {
        let selected = (!log.is_empty()).then(|| log.selected());
        if !self.detail_stale && selected == self.shown {
            return;
        }

        if selected != self.shown {
            self.request_scroll = 0;
            self.response_scroll = 0;
        }

        let pair = log.selected_pair();
        self.request_text = detail_text(pair.and_then(Pair::request));
        self.response_text = detail_text(pair.and_then(Pair::response));
        self.shown = selected;
        self.detail_stale = false;
    }

    /// Map a key press to an action, handling view-local keys directly
    pub fn handle_key(&mut self, key: KeyEvent, log: &OrderedLog) -> Action {
        let last = log.len().saturating_sub(1);
        let selected = log.selected();

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('r') => Action::Clear,
            KeyCode::Char('d') => Action::CycleStatusLevel,
            KeyCode::Up | KeyCode::Char('k') => Action::Select(selected.saturating_sub(1)),
            KeyCode::Down | KeyCode::Char('j') => Action::Select((selected + 1).min(last)),
            KeyCode::Home => Action::Select(0),
            KeyCode::End => Action::Select(last),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Request => Focus::Response,
                    Focus::Response => Focus::Request,
                };
                Action::None
            }
            KeyCode::PageUp => {
                let scroll = self.focused_scroll();
                *scroll = scroll.saturating_sub(PAGE_LINES);
                Action::None
            }
            KeyCode::PageDown => {
                let scroll = self.focused_scroll();
                *scroll = scroll.saturating_add(PAGE_LINES);
                Action::None
            }
            _ => Action::None,
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Record how the capture finished
    pub fn capture_ended(&mut self, result: &Result<Option<ExitStatus>, CaptureError>) {
        self.capture = Some(match result {
            Ok(Some(status)) => format!("tshark exited ({})", status),
            Ok(None) => "capture ended".to_string(),
            Err(e) => format!("capture failed: {}", e),
        });
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn request_text(&self) -> &str {
        &self.request_text
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn request_scroll(&self) -> u16 {
        self.request_scroll
    }

    pub fn response_scroll(&self) -> u16 {
        self.response_scroll
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn capture_state(&self) -> &str {
        self.capture.as_deref().unwrap_or("capturing")
    }

    fn focused_scroll(&mut self) -> &mut u16 {
        match self.focus {
            Focus::Request => &mut self.request_scroll,
            Focus::Response => &mut self.response_scroll,
        }
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

fn detail_text(view: Option<&PacketView>) -> String {
    view.map(|v| v.display_record().to_pretty_json())
        .unwrap_or_default()
}

/// Restores the terminal when dropped, including on error paths
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Run the dashboard until the user quits
///
/// Returns a [`ShapeError`](kshark_core::ShapeError) as soon as one occurs
/// unless `skip_malformed` is set. A failed capture is shown in the status
/// line and reported once the user quits.
pub fn run(
    mut capture_rx: mpsc::Receiver<CaptureMessage>,
    status_rx: Receiver<StatusMessage>,
    status_level: Arc<StatusLevel>,
    skip_malformed: bool,
) -> anyhow::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    terminal.clear()?;

    let (event_tx, event_rx) = std::sync::mpsc::channel::<LogEvent>();
    let mut session = Session::new(SelectorConfig::default(), event_tx);
    let mut dashboard = Dashboard::new();
    let mut outcome = Ok(());

    loop {
        for _ in 0..MAX_MESSAGES_PER_FRAME {
            let Ok(message) = capture_rx.try_recv() else {
                break;
            };
            if let Flow::Ended(result) = handle_message(&mut session, message, skip_malformed)? {
                dashboard.capture_ended(&result);
                outcome = capture_outcome(result);
            }
        }

        for event in event_rx.try_iter() {
            dashboard.apply_event(event, session.correlator().log());
        }
        for message in status_rx.try_iter() {
            dashboard.set_status(message.summary());
        }
        dashboard.sync_detail(session.correlator().log());

        terminal.draw(|frame| ui::render(frame, &dashboard, session.correlator().log()))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match dashboard.handle_key(key, session.correlator().log()) {
            Action::Quit => break,
            Action::Clear => session.clear(),
            Action::Select(index) => session.correlator_mut().set_selection(index),
            Action::CycleStatusLevel => {
                let level = status_level.cycle();
                dashboard.set_status(format!("status level {}", level));
            }
            Action::None => {}
        }
    }

    outcome
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use kshark_core::{Correlator, Record};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Request,
        /// Response citing the n-th frame seen so far (or an unseen one)
        Response(usize),
        Select(usize),
        Clear,
        /// Deliver queued events to the dashboard
        Redraw,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            4 => Just(Step::Request),
            4 => (0usize..16).prop_map(Step::Response),
            2 => (0usize..16).prop_map(Step::Select),
            1 => Just(Step::Clear),
            3 => Just(Step::Redraw),
        ]
    }

    fn redraw(dashboard: &mut Dashboard, corr: &mut Correlator) {
        for event in corr.drain_events() {
            dashboard.apply_event(event, corr.log());
        }
        dashboard.sync_detail(corr.log());
    }

    proptest! {
        #[test]
        fn titles_and_detail_track_the_log(steps in prop::collection::vec(step(), 1..64)) {
            let mut corr: Correlator = Correlator::default();
            let mut dashboard = Dashboard::new();
            let mut frames: Vec<u64> = Vec::new();
            let mut next_frame = 1u64;

            for step in steps {
                match step {
                    Step::Request => {
                        let view = PacketView::new(next_frame, "t", Record::new());
                        corr.ingest(view.with_request_key("3"));
                        frames.push(next_frame);
                        next_frame += 1;
                    }
                    Step::Response(n) => {
                        let cited = frames.get(n).copied().unwrap_or(10_000 + n as u64);
                        let view = PacketView::new(next_frame, "t", Record::new());
                        corr.ingest(view.with_request_frame(cited));
                        frames.push(next_frame);
                        next_frame += 1;
                    }
                    Step::Select(index) => corr.set_selection(index),
                    Step::Clear => {
                        corr.clear();
                        frames.clear();
                    }
                    Step::Redraw => redraw(&mut dashboard, &mut corr),
                }
            }
            redraw(&mut dashboard, &mut corr);

            let expected: Vec<String> = corr.pairs().iter().map(Pair::title).collect();
            prop_assert_eq!(dashboard.titles(), expected.as_slice());

            let selected = corr.log().selected_pair();
            let request = detail_text(selected.and_then(Pair::request));
            let response = detail_text(selected.and_then(Pair::response));
            prop_assert_eq!(dashboard.request_text(), request);
            prop_assert_eq!(dashboard.response_text(), response);
        }
    }
}
