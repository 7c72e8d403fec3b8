//! UI rendering.
//!
//! Layout, top to bottom: header, tab bar, transcript, prompt input, key
//! hints. On wide terminals the mascot panel sits left of the tab bar and
//! transcript. The selection dialog is drawn on top when open.

use agent_terminal_core::session::{Emphasis, Session, SessionState};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};

use super::mascot;
use super::selection::{Field, SelectionDialog, PRESETS};
use super::state::App;

const HINTS: &str =
    "Ctrl+T add agent | Ctrl+W close | Ctrl+←/→ or Alt+1..9 switch | Enter send | Ctrl+Q quit";

/// Main render entry point. Called each frame by the event loop.
pub fn render(app: &App, frame: &mut ratatui::Frame) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(2),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, chunks[0]);

    let body = if area.width >= mascot::MIN_TERMINAL_WIDTH {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(mascot::PANEL_WIDTH), Constraint::Min(1)])
            .split(chunks[1]);
        render_mascot(app, frame, columns[0]);
        columns[1]
    } else {
        chunks[1]
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(body);
    render_tabs(app, frame, rows[0]);
    render_transcript(app, frame, rows[1]);

    render_input(app, frame, chunks[2]);
    render_hints(frame, chunks[3]);

    if let Some(dialog) = &app.dialog {
        render_dialog(dialog, frame, area);
    }
}

fn render_header(frame: &mut ratatui::Frame, area: Rect) {
    let version = env!("CARGO_PKG_VERSION");
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " agent-terminal ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" v{version}"), Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(header, area);
}

fn render_mascot(app: &App, frame: &mut ratatui::Frame, area: Rect) {
    let art = mascot::art(app.mascot.as_deref());
    let panel = Paragraph::new(art)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::RIGHT));
    frame.render_widget(panel, area);
}

fn tab_label(session: &Session) -> String {
    match session.state() {
        SessionState::Busy => format!("{} …", session.title),
        _ => session.title.clone(),
    }
}

fn render_tabs(app: &App, frame: &mut ratatui::Frame, area: Rect) {
    let sessions = app.manager.sessions();
    if sessions.is_empty() {
        let empty = Paragraph::new(Line::raw("No agents. Press Ctrl+T to add one."))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let titles: Vec<Line> = sessions
        .iter()
        .map(|session| {
            let style = match session.state() {
                SessionState::Errored(_) => Style::default().fg(Color::Red),
                _ => Style::default().fg(Color::White),
            };
            Line::from(Span::styled(tab_label(session), style))
        })
        .collect();
    let selected = app
        .manager
        .focused()
        .and_then(|id| sessions.iter().position(|s| s.id == id));

    let tabs = Tabs::new(titles)
        .select(selected.unwrap_or(0))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .divider("|");
    frame.render_widget(tabs, area);
}

fn emphasis_style(emphasis: Emphasis) -> Style {
    match emphasis {
        Emphasis::Plain => Style::default().fg(Color::White),
        Emphasis::Notice => Style::default().fg(Color::Yellow),
        Emphasis::Dim => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM | Modifier::ITALIC),
        Emphasis::Agent => Style::default().fg(Color::Green),
        Emphasis::Error => Style::default().fg(Color::Red),
    }
}

fn transcript_lines(session: &Session) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for entry in session.transcript() {
        let style = emphasis_style(entry.emphasis);
        let mut text_lines = entry.text.lines();
        let first = text_lines.next().unwrap_or("");
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}: ", entry.sender),
                style.add_modifier(Modifier::BOLD),
            ),
            Span::styled(first, style),
        ]));
        for rest in text_lines {
            lines.push(Line::from(Span::styled(rest, style)));
        }
    }
    lines
}

/// Rows `lines` take when wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_transcript(app: &App, frame: &mut ratatui::Frame, area: Rect) {
    let block = Block::default().borders(Borders::TOP);
    let inner = block.inner(area);

    let Some(session) = app.manager.focused_session() else {
        frame.render_widget(block, area);
        return;
    };

    let lines = transcript_lines(session);
    let overflow = wrapped_height(&lines, inner.width).saturating_sub(inner.height);
    let transcript = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((overflow, 0));
    frame.render_widget(transcript, area);
}

fn render_input(app: &App, frame: &mut ratatui::Frame, area: Rect) {
    let enabled = app.manager.input_enabled();
    let (title, style) = if enabled {
        (" Message ", Style::default().fg(Color::White))
    } else {
        let reason = match app.manager.focused_session().map(Session::state) {
            Some(SessionState::Busy) => " Waiting for reply… ",
            Some(SessionState::Errored(_)) => " Agent unavailable ",
            _ => " No agent ",
        };
        (reason, Style::default().fg(Color::DarkGray))
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(style);
    let input = Paragraph::new(app.input.as_str()).style(style).block(block);
    frame.render_widget(input, area);

    if enabled && app.dialog.is_none() {
        let cursor_x = area.x + 1 + app.input.chars().count() as u16;
        let max_x = area.x + area.width.saturating_sub(2);
        frame.set_cursor_position((cursor_x.min(max_x), area.y + 1));
    }
}

fn render_hints(frame: &mut ratatui::Frame, area: Rect) {
    let hints = Paragraph::new(Line::raw(HINTS)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(hints, area);
}

fn render_dialog(dialog: &SelectionDialog, frame: &mut ratatui::Frame, area: Rect) {
    let rect = centered_rect(60, 60, area);
    frame.render_widget(Clear, rect);

    let mut lines = Vec::new();
    for (idx, preset) in PRESETS.iter().enumerate() {
        let style = if idx == dialog.selected {
            Style::default().fg(Color::Black).bg(Color::White)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(Span::styled(preset.label, style)));
    }

    let preset = dialog.preset();
    if preset.needs_model_input() {
        lines.push(Line::raw(""));
        lines.push(field_line("Model", &dialog.model_input, dialog.field == Field::Model));
    }
    if preset.needs_audio_input() {
        lines.push(Line::raw(""));
        lines.push(field_line(
            "Reference audio",
            &dialog.audio_input,
            dialog.field == Field::Audio,
        ));
    }
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(
        "↑/↓ choose  Tab next field  Enter create  Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Select an agent ")
        .style(Style::default().bg(Color::Black));
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .style(Style::default().bg(Color::Black)),
        rect,
    );
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Line<'a> {
    let value_style = if focused {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::Cyan)
    };
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::White)),
        Span::styled(format!("{value} "), value_style),
    ])
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_width = r.width * percent_x / 100;
    let popup_height = r.height * percent_y / 100;
    let x = r.x + (r.width.saturating_sub(popup_width)) / 2;
    let y = r.y + (r.height.saturating_sub(popup_height)) / 2;
    Rect::new(x, y, popup_width, popup_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_terminal_core::{
        BackendKind, ConnectorFactory, ConnectorSettings, ConnectorSpec, SessionManager,
    };
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn app_with_llama() -> App {
        let factory =
            ConnectorFactory::new(ConnectorSettings::default()).credential_lookup(|_| None);
        let mut app = App::new(SessionManager::new(factory));
        app.dialog = None;
        app.manager
            .create_session(&ConnectorSpec::new(BackendKind::Ollama, "llama3"));
        app
    }

    fn draw(app: &App) -> String {
        draw_sized(app, 100)
    }

    fn draw_sized(app: &App, width: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, 24)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.cell((x, y)).map_or(" ", |cell| cell.symbol()));
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn centered_rect_is_centered() {
        let rect = centered_rect(50, 50, Rect::new(0, 0, 100, 40));
        assert_eq!(rect, Rect::new(25, 10, 50, 20));
    }

    #[test]
    fn wrapped_height_counts_rows() {
        let lines = vec![Line::raw("x".repeat(25)), Line::raw("")];
        assert_eq!(wrapped_height(&lines, 10), 4);
    }

    #[test]
    fn draws_tab_and_started_notice() {
        let screen = draw(&app_with_llama());
        assert!(screen.contains("OllamaAgent: llama3"));
        assert!(screen.contains("Agent 'OllamaAgent: llama3' started."));
        assert!(screen.contains("Message"));
    }

    #[test]
    fn draws_dialog_presets() {
        let factory =
            ConnectorFactory::new(ConnectorSettings::default()).credential_lookup(|_| None);
        let app = App::new(SessionManager::new(factory));
        let screen = draw(&app);

        assert!(screen.contains("Select an agent"));
        for preset in PRESETS.iter() {
            assert!(screen.contains(preset.label), "missing {}", preset.label);
        }
        assert!(screen.contains("No agent"));
    }

    #[test]
    fn busy_session_shows_waiting_input() {
        let mut app = app_with_llama();
        app.manager.begin_turn("Hello").unwrap();
        let screen = draw(&app);
        assert!(screen.contains("Waiting for reply"));
        assert!(screen.contains("User: Hello"));
    }

    #[test]
    fn wide_terminal_shows_mascot_beside_tabs() {
        let screen = draw_sized(&app_with_llama(), 100);
        assert!(screen.contains("[o_o]"));
        let tab_row = screen.lines().nth(1).unwrap();
        assert!(tab_row.contains("OllamaAgent: llama3"));
        assert!(tab_row.find("OllamaAgent").unwrap() >= usize::from(mascot::PANEL_WIDTH));
    }

    #[test]
    fn narrow_terminal_hides_mascot() {
        let screen = draw_sized(&app_with_llama(), 70);
        assert!(!screen.contains("[o_o]"));
        assert!(screen.contains("OllamaAgent: llama3"));
    }
}
