//! Terminal front end: owns the render loop, turns terminal and relay events
//! into `SessionEvent`s, and draws one frame per event.

pub mod input;
pub mod settings;
pub mod text;
pub mod theme;

use crate::app::{Flow, ModeKind, Session, SessionEvent};
use crate::config::Position;
use crate::log_debug;
use crate::terminal_restore::TerminalRestoreGuard;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{
    backend::CrosstermBackend,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph},
    Frame, Terminal, TerminalOptions, Viewport,
};
use settings::{SettingsField, SettingsForm, SettingsItem};
use std::io::{self, Stdout};
use std::thread;
use std::time::Duration;
use theme::Theme;

const INPUT_CHANNEL_CAPACITY: usize = 64;
const SPINNER_INTERVAL: Duration = Duration::from_millis(100);
/// Border columns plus two cells of horizontal padding on each side.
const HORIZONTAL_CHROME: u16 = 6;
const MIN_CONTENT_WIDTH: usize = 20;
const MAX_ERROR_ROWS: usize = 3;
const PROMPT: &str = "❯ ";
const PLACEHOLDER: &str = "Ask anything...";

type Backend = CrosstermBackend<Stdout>;

/// Take over the terminal and run the session until the user quits.
pub fn run_app(mut session: Session) -> Result<()> {
    let guard = TerminalRestoreGuard::new();
    guard
        .enable_raw_mode()
        .context("failed to enable raw mode")?;
    let mut terminal = build_terminal(&guard, &session)?;

    let (input_tx, input_rx) = bounded(INPUT_CHANNEL_CAPACITY);
    spawn_input_thread(input_tx);

    let result = event_loop(&mut terminal, &mut session, &input_rx);
    session.shutdown();
    if result.is_ok() && !session.settings().clear_screen {
        // Leave the final frame in scrollback and put the shell prompt below it.
        let _ = terminal.show_cursor();
        println!("\r");
    }
    drop(guard);
    result
}

fn build_terminal(guard: &TerminalRestoreGuard, session: &Session) -> Result<Terminal<Backend>> {
    let mut stdout = io::stdout();
    let settings = session.settings();
    let viewport = if settings.clear_screen {
        guard
            .enter_alt_screen(&mut stdout)
            .context("failed to enter alternate screen")?;
        Viewport::Fullscreen
    } else {
        let (_, rows) = crossterm::terminal::size().context("failed to read terminal size")?;
        let rows = match settings.position() {
            Position::Top => rows / 2,
            Position::Bottom => rows,
        };
        Viewport::Inline(rows.max(1))
    };
    let backend = CrosstermBackend::new(stdout);
    Terminal::with_options(backend, TerminalOptions { viewport })
        .context("failed to initialise terminal")
}

fn spawn_input_thread(tx: Sender<Event>) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match event::read() {
            Ok(event) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(err) => {
                log_debug(&format!("terminal input error: {err}"));
                return;
            }
        }
    })
}

enum LoopEvent {
    Session(SessionEvent),
    Redraw,
    InputClosed,
}

fn event_loop(
    terminal: &mut Terminal<Backend>,
    session: &mut Session,
    input_rx: &Receiver<Event>,
) -> Result<()> {
    let ticker = tick(SPINNER_INTERVAL);
    let mut viewport = (0u16, 0u16);
    loop {
        terminal.autoresize().context("failed to resize terminal")?;
        let area = terminal.get_frame().size();
        if (area.width, area.height) != viewport {
            viewport = (area.width, area.height);
            session.handle_event(SessionEvent::Resize {
                width: area.width,
                height: area.height,
            });
        }
        let theme = Theme::from_settings(&session.settings().theme);
        terminal
            .draw(|frame| draw(frame, session, &theme))
            .context("failed to draw frame")?;

        let listener = session.listener();
        let spinner = if session.is_streaming() {
            ticker.clone()
        } else {
            never()
        };
        let next = select! {
            recv(input_rx) -> event => match event {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    LoopEvent::Session(SessionEvent::Key(key))
                }
                Ok(_) => LoopEvent::Redraw,
                Err(_) => LoopEvent::InputClosed,
            },
            recv(listener.chunks()) -> msg => {
                LoopEvent::Session(SessionEvent::Relay(listener.chunk_event(msg)))
            },
            recv(listener.done()) -> msg => {
                LoopEvent::Session(SessionEvent::Relay(listener.done_event(msg)))
            },
            recv(spinner) -> _ => LoopEvent::Session(SessionEvent::Tick),
        };
        match next {
            LoopEvent::Session(event) => {
                if session.handle_event(event) == Flow::Quit {
                    return Ok(());
                }
            }
            LoopEvent::Redraw => {}
            LoopEvent::InputClosed => {
                log_debug("terminal input closed; exiting");
                return Ok(());
            }
        }
    }
}

/// Columns available for text inside the box on a terminal `columns` wide.
pub fn content_width(columns: u16) -> usize {
    usize::from(columns.saturating_sub(HORIZONTAL_CHROME)).max(MIN_CONTENT_WIDTH)
}

/// Render the whole box for the current session state.
pub fn draw(frame: &mut Frame, session: &Session, theme: &Theme) {
    let area = frame.size();
    if area.width < 4 || area.height < 3 {
        return;
    }
    let width = content_width(area.width);
    let inner_height = usize::from(area.height.saturating_sub(2));
    let (lines, scroll) = match session.settings_form() {
        Some(form) => {
            let (lines, selected) = settings_lines(form, theme, width);
            let scroll = selected.saturating_sub(inner_height.saturating_sub(1));
            (lines, scroll)
        }
        None => (main_lines(session, theme, width, inner_height), 0),
    };

    let rows = (lines.len().min(inner_height) + 2) as u16;
    let rect = anchored_rect(area, rows, session.settings().position());
    let title = format!(" asktty v{} | {} ", env!("CARGO_PKG_VERSION"), session.model());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(theme.border())
        .title(Span::styled(title, theme.title()))
        .padding(Padding::horizontal(2));
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .scroll((scroll.min(usize::from(u16::MAX)) as u16, 0)),
        rect,
    );
}

fn anchored_rect(area: Rect, rows: u16, position: Position) -> Rect {
    let height = rows.min(area.height);
    let y = match position {
        Position::Top => area.y,
        Position::Bottom => area.bottom().saturating_sub(height),
    };
    Rect {
        x: area.x,
        y,
        width: area.width,
        height,
    }
}

fn main_lines(
    session: &Session,
    theme: &Theme,
    width: usize,
    height: usize,
) -> Vec<Line<'static>> {
    let mode = session.mode();
    let mut head: Vec<Vec<Line<'static>>> = Vec::new();
    if let Some(query) = session.last_query() {
        let query = format!("{PROMPT}{query}");
        head.push(vec![Line::from(Span::styled(
            text::truncate_to_width(&query, width).to_string(),
            theme.dim(),
        ))]);
    }

    let mut tail: Vec<Vec<Line<'static>>> = Vec::new();
    if let Some(error) = session.error() {
        let mut rows = styled_rows(&format!("Error: {error}"), width, theme.error());
        rows.truncate(MAX_ERROR_ROWS);
        tail.push(rows);
    }
    if mode != ModeKind::Pager {
        tail.push(vec![compose_line(session, theme, width)]);
    }
    let status = status_text(session);
    tail.push(vec![Line::from(Span::styled(
        text::truncate_to_width(&status, width).to_string(),
        theme.status(),
    ))]);

    if cost(&head) + cost(&tail) > height + 1 {
        head.clear();
    }
    let budget = height.saturating_sub(cost(&head) + cost(&tail));
    let response = response_rows(session, theme, width, budget);

    let mut lines = Vec::new();
    let sections = head.into_iter().chain(response).chain(tail);
    for (idx, section) in sections.enumerate() {
        if idx > 0 {
            lines.push(Line::default());
        }
        lines.extend(section);
    }
    lines
}

/// Rows a run of sections takes, counting the blank line before each.
fn cost(sections: &[Vec<Line<'static>>]) -> usize {
    sections.iter().map(|section| section.len() + 1).sum()
}

/// Response rows that fit in `budget`. The compact view keeps the newest rows
/// so the streaming tail and spinner stay on screen.
fn response_rows(
    session: &Session,
    theme: &Theme,
    width: usize,
    budget: usize,
) -> Option<Vec<Line<'static>>> {
    let mode = session.mode();
    let buffer = session.buffer();
    if budget == 0 {
        return None;
    }
    if mode == ModeKind::Pager {
        let mut rows: Vec<Line<'static>> = buffer
            .visible_lines()
            .into_iter()
            .map(|row| {
                let row = text::truncate_to_width(&row, width).to_string();
                Line::from(Span::styled(row, theme.text()))
            })
            .collect();
        rows.resize(buffer.visible_height().min(budget), Line::default());
        return Some(rows);
    }
    if buffer.is_empty() && mode != ModeKind::Streaming {
        return None;
    }
    let mut rows = styled_rows(buffer.text(), width, theme.text());
    if mode == ModeKind::Streaming {
        if let Some(last) = rows.last_mut() {
            last.spans.push(Span::styled(session.spinner(), theme.spinner()));
        }
    }
    let hidden = rows.len().saturating_sub(budget);
    Some(rows.split_off(hidden))
}

fn styled_rows(content: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    text::wrap_text(content, width)
        .into_iter()
        .map(|row| Line::from(Span::styled(row, style)))
        .collect()
}

fn compose_line(session: &Session, theme: &Theme, width: usize) -> Line<'static> {
    let compose = session.compose();
    let available = width.saturating_sub(text::display_width(PROMPT) + 1);
    let mut spans = vec![Span::styled(PROMPT, theme.prompt())];
    let caret = Style::default().add_modifier(Modifier::REVERSED);
    if session.mode() != ModeKind::Input {
        spans.push(Span::styled(
            text::tail_to_width(compose.text(), available).to_string(),
            theme.dim(),
        ));
        return Line::from(spans);
    }
    if compose.is_empty() {
        spans.push(Span::styled(" ", caret));
        spans.push(Span::styled(PLACEHOLDER, theme.dim()));
        return Line::from(spans);
    }
    let (before, after) = compose.split_at_cursor();
    let before = text::tail_to_width(before, available);
    spans.push(Span::raw(before.to_string()));
    let mut rest = after.chars();
    let under_caret = rest.next().map(String::from).unwrap_or_else(|| " ".to_string());
    spans.push(Span::styled(under_caret, caret));
    let remaining = available.saturating_sub(text::display_width(before));
    spans.push(Span::raw(
        text::truncate_to_width(rest.as_str(), remaining).to_string(),
    ));
    if let Some(hint) = compose.hint() {
        spans.push(Span::styled(hint.to_string(), theme.hint()));
    }
    Line::from(spans)
}

fn status_text(session: &Session) -> String {
    match session.mode() {
        ModeKind::Streaming => "Streaming... (esc to cancel)".to_string(),
        ModeKind::Pager => format!(
            "{} • ↑↓ scroll • pgup/pgdn page • q close",
            session.buffer().scroll_position()
        ),
        ModeKind::Input if session.buffer().is_overflowing() => {
            "ctrl+o pager • /help commands • /settings configure • esc quit".to_string()
        }
        _ => "/help commands • /settings configure • esc quit".to_string(),
    }
}

/// Lines for the settings form plus the row index of the selected item.
fn settings_lines(form: &SettingsForm, theme: &Theme, width: usize) -> (Vec<Line<'static>>, usize) {
    let mut lines = vec![
        Line::from(Span::styled("Settings", theme.title())),
        Line::default(),
    ];
    let mut selected_row = 0;
    for (idx, item) in form.visible_items().into_iter().enumerate() {
        let is_cursor = idx == form.cursor();
        let label_style = if is_cursor { theme.selected() } else { theme.dim() };
        if is_cursor {
            selected_row = lines.len();
        }
        match item {
            SettingsItem::Save => {
                let marker = if is_cursor { "  ▸ " } else { "    " };
                lines.push(Line::from(Span::styled(
                    format!("{marker}[ Save & Exit ]"),
                    label_style,
                )));
            }
            SettingsItem::Group(group) => {
                let arrow = if form.is_expanded(group) { "▾" } else { "▸" };
                lines.push(Line::from(Span::styled(
                    format!("{arrow} {}", group.label()),
                    label_style,
                )));
                if !form.is_expanded(group) {
                    let summary = format!("    {}", form.group_summary(group));
                    lines.push(Line::from(Span::styled(
                        text::truncate_to_width(&summary, width).to_string(),
                        theme.dim(),
                    )));
                }
                lines.push(Line::default());
            }
            SettingsItem::Field(field) => {
                let marker = if is_cursor { "▸" } else { " " };
                lines.push(Line::from(Span::styled(
                    format!("    {marker} {}:", field.label()),
                    label_style,
                )));
                if let Some(hint) = field.hint() {
                    let hint = format!("      {hint}");
                    lines.push(Line::from(Span::styled(
                        text::truncate_to_width(&hint, width).to_string(),
                        theme.dim(),
                    )));
                }
                lines.push(field_value_line(form, field, is_cursor, theme, width));
                lines.push(Line::default());
            }
        }
    }
    lines.push(Line::from(Span::styled(
        "↑↓ navigate • enter expand/save • esc back",
        theme.dim(),
    )));
    (lines, selected_row)
}

fn field_value_line(
    form: &SettingsForm,
    field: SettingsField,
    focused: bool,
    theme: &Theme,
    width: usize,
) -> Line<'static> {
    let input = form.field(field);
    let available = width.saturating_sub(8);
    let mut spans = vec![Span::raw("      ")];
    if input.is_empty() {
        if focused {
            spans.push(Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)));
        }
        spans.push(Span::styled(field.placeholder(), theme.hint()));
        return Line::from(spans);
    }
    let shown = if field.is_secret() {
        input.masked()
    } else {
        input.text().to_string()
    };
    let shown = text::tail_to_width(&shown, available).to_string();
    let style = if focused { theme.text() } else { theme.dim() };
    spans.push(Span::styled(shown, style));
    if focused {
        spans.push(Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryStore, Settings};
    use crate::provider::{CompletionClient, ScriptStep, ScriptedClient};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn test_session(settings: Settings) -> Session {
        session_with(settings, ScriptedClient::chunks(["unused"]))
    }

    fn session_with(settings: Settings, client: ScriptedClient) -> Session {
        let client: Arc<dyn CompletionClient> = Arc::new(client);
        Session::new(
            settings,
            Box::new(move |_: &Settings| Ok(client.clone())),
            Box::new(MemoryStore::default()),
        )
        .unwrap()
    }

    fn keyed_settings() -> Settings {
        let mut settings = Settings::default();
        settings.set_api_key("sk-test");
        settings.context.include_cwd = false;
        settings
    }

    fn numbered(lines: usize) -> String {
        (1..=lines)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn press(session: &mut Session, code: KeyCode) {
        session.handle_event(SessionEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    /// Apply relay events until `done` holds or the stream ends.
    fn pump_until(session: &mut Session, done: impl Fn(&Session) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while session.is_streaming() && !done(&*session) {
            assert!(Instant::now() < deadline, "relay did not deliver in time");
            if let Some(event) = session.listener().recv_timeout(Duration::from_millis(50)) {
                session.handle_event(SessionEvent::Relay(event));
            }
        }
    }

    fn resize(session: &mut Session, width: u16, height: u16) {
        session.handle_event(SessionEvent::Resize { width, height });
    }

    fn render(session: &Session, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        let theme = Theme::from_settings(&session.settings().theme);
        terminal.draw(|frame| draw(frame, session, &theme)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buffer.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn box_is_anchored_to_bottom_with_title() {
        let session = test_session(Settings::default());
        let rows = render(&session, 60, 20);
        assert!(rows[0].trim().is_empty());
        let title_row = rows.iter().position(|row| row.contains("asktty v")).unwrap();
        assert!(rows[title_row].contains("| scripted"));
        assert!(rows[19].starts_with('╰'));
        assert!(rows.iter().any(|row| row.contains("❯") && row.contains("Ask anything...")));
        assert!(rows.iter().any(|row| row.contains("/help commands")));
    }

    #[test]
    fn top_position_anchors_to_first_row() {
        let mut settings = Settings::default();
        settings.position = "top".into();
        let session = test_session(settings);
        let rows = render(&session, 60, 20);
        assert!(rows[0].starts_with('╭'));
        assert!(rows[0].contains("asktty v"));
    }

    #[test]
    fn error_line_is_rendered() {
        let mut session = test_session(Settings::default());
        session.submit("hello");
        let rows = render(&session, 80, 20);
        assert!(rows.iter().any(|row| row.contains("Error: no API key set")));
    }

    #[test]
    fn settings_form_renders_collapsed_groups() {
        let mut session = test_session(Settings::default());
        session.submit("/settings");
        let rows = render(&session, 80, 30);
        assert!(rows.iter().any(|row| row.contains("▸ API Configuration")));
        assert!(rows.iter().any(|row| row.contains("gpt-4o-mini @ openai")));
        assert!(rows.iter().any(|row| row.contains("[ Save & Exit ]")));
    }

    #[test]
    fn pager_shows_scroll_position() {
        let mut session = test_session(Settings::default());
        session.handle_event(SessionEvent::Resize {
            width: 80,
            height: 16,
        });
        session.submit("/help");
        session.handle_event(SessionEvent::Key(crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Char('o'),
            crossterm::event::KeyModifiers::CONTROL,
        )));
        assert_eq!(session.mode(), ModeKind::Pager);
        let rows = render(&session, 80, 16);
        assert!(rows.iter().any(|row| row.contains("TOP • ↑↓ scroll")));
        assert!(rows.iter().any(|row| row.contains("Commands:")));
        assert!(!rows.iter().any(|row| row.contains("Pager:")));
    }

    #[test]
    fn tiny_terminal_draws_nothing() {
        let session = test_session(Settings::default());
        let rows = render(&session, 3, 2);
        assert!(rows.iter().all(|row| row.trim().is_empty()));
    }

    #[test]
    fn prompt_stays_visible_after_leaving_pager_on_long_answer() {
        let mut session = session_with(keyed_settings(), ScriptedClient::chunks([numbered(30)]));
        resize(&mut session, 80, 20);
        session.submit("count to thirty");
        pump_until(&mut session, |_| false);
        assert_eq!(session.mode(), ModeKind::Pager);
        press(&mut session, KeyCode::Esc);
        assert_eq!(session.mode(), ModeKind::Input);

        let rows = render(&session, 80, 20);
        assert!(rows.iter().any(|row| row.contains("Ask anything...")));
        assert!(rows.iter().any(|row| row.contains("ctrl+o pager")));
        assert!(rows.iter().any(|row| row.contains("count to thirty")));
        // The compact view shows the newest rows.
        assert!(rows.iter().any(|row| row.contains("line 30")));
        assert!(!rows.iter().any(|row| row.contains("line 18")));
        assert!(rows[19].starts_with('╰'));
    }

    #[test]
    fn streaming_tail_and_spinner_stay_on_screen() {
        let client = ScriptedClient::new(vec![
            ScriptStep::Chunk(numbered(40)),
            ScriptStep::WaitForCancel,
        ]);
        let mut session = session_with(keyed_settings(), client);
        resize(&mut session, 80, 20);
        session.submit("stream");
        pump_until(&mut session, |session| session.buffer().line_count() == 40);
        assert_eq!(session.mode(), ModeKind::Streaming);

        let rows = render(&session, 80, 20);
        let tail = rows.iter().find(|row| row.contains("line 40")).unwrap();
        assert!(tail.contains(session.spinner()));
        assert!(rows.iter().any(|row| row.contains("Streaming... (esc to cancel)")));
        session.shutdown();
    }

    #[test]
    fn error_after_long_partial_answer_is_shown() {
        let client = ScriptedClient::new(vec![
            ScriptStep::Chunk(numbered(40)),
            ScriptStep::Fail("connection reset".into()),
        ]);
        let mut session = session_with(keyed_settings(), client);
        resize(&mut session, 80, 20);
        session.submit("stream");
        pump_until(&mut session, |_| false);
        assert_eq!(session.mode(), ModeKind::Input);

        let rows = render(&session, 80, 20);
        assert!(rows.iter().any(|row| row.contains("Error: connection reset")));
        assert!(rows.iter().any(|row| row.contains("Ask anything...")));
    }

    #[test]
    fn pager_wraps_long_lines_instead_of_cutting_them() {
        let first = format!("{}TAILMARK", "word ".repeat(30));
        let answer = format!("{first}\n{}", numbered(10));
        let mut session = session_with(keyed_settings(), ScriptedClient::chunks([answer]));
        resize(&mut session, 80, 20);
        session.submit("wrap");
        pump_until(&mut session, |_| false);
        assert_eq!(session.mode(), ModeKind::Pager);
        assert_eq!(session.buffer().line_count(), 11);

        let rows = render(&session, 80, 20);
        assert!(rows.iter().any(|row| row.contains("TAILMARK")));
        assert!(!rows.iter().any(|row| row.contains("line 10")));

        press(&mut session, KeyCode::End);
        let rows = render(&session, 80, 20);
        assert!(rows.iter().any(|row| row.contains("line 10")));
        assert!(rows.iter().any(|row| row.contains("END • ↑↓ scroll")));
    }
}
