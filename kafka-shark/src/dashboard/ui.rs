//! Dashboard rendering

use kshark_core::OrderedLog;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use super::{Dashboard, Focus};

pub fn render(frame: &mut Frame, dashboard: &Dashboard, log: &OrderedLog) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.size());

    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(30),
            Constraint::Percentage(50),
        ])
        .split(outer[0]);

    render_log(frame, panes[0], dashboard, log);
    render_packet(
        frame,
        panes[1],
        "Request",
        dashboard.request_text(),
        dashboard.request_scroll(),
        dashboard.focus() == Focus::Request,
    );
    render_packet(
        frame,
        panes[2],
        "Response",
        dashboard.response_text(),
        dashboard.response_scroll(),
        dashboard.focus() == Focus::Response,
    );
    render_status(frame, outer[1], dashboard, log);
}

fn render_log(frame: &mut Frame, area: Rect, dashboard: &Dashboard, log: &OrderedLog) {
    let items: Vec<ListItem> = dashboard
        .titles()
        .iter()
        .map(|title| ListItem::new(title.as_str()))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Log ({})", log.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default().with_selected((!log.is_empty()).then(|| log.selected()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_packet(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    text: &str,
    scroll: u16,
    focused: bool,
) {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border),
        )
        .scroll((scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, dashboard: &Dashboard, log: &OrderedLog) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", dashboard.capture_state()),
            Style::default().fg(Color::Black).bg(Color::Gray),
        ),
        Span::raw(format!(" {} entries ", log.len())),
    ];
    if let Some(status) = dashboard.status() {
        spans.push(Span::styled(
            status.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kshark_core::{Correlator, PacketView, Record};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen(dashboard: &Dashboard, log: &OrderedLog) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 40)).unwrap();
        terminal
            .draw(|frame| render(frame, dashboard, log))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_render_empty() {
        let corr: Correlator = Correlator::default();
        let dashboard = Dashboard::new();
        let text = screen(&dashboard, corr.log());

        assert!(text.contains("Log (0)"));
        assert!(text.contains("Request"));
        assert!(text.contains("Response"));
        assert!(text.contains("capturing"));
    }

    #[test]
    fn test_render_entries() {
        let mut corr: Correlator = Correlator::default();
        corr.ingest(
            PacketView::new(5, "10:00:05", Record::new())
                .with_request_key("3")
                .with_showname("Kafka (Metadata)"),
        );
        corr.ingest(PacketView::new(6, "10:00:06", Record::new()).with_request_frame(5));

        let mut dashboard = Dashboard::new();
        for event in corr.drain_events() {
            dashboard.apply_event(event, corr.log());
        }
        dashboard.sync_detail(corr.log());
        dashboard.set_status("WARN capture: tshark exited");

        let text = screen(&dashboard, corr.log());
        assert!(text.contains("Log (1)"));
        assert!(text.contains("       5        6 10:00:05 Kafka (Metadata)"));
        assert!(text.contains("\"request_frame\": 5"));
        assert!(text.contains("1 entries"));
        assert!(text.contains("tshark exited"));
    }
}
