// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use datadict_app::{
    ChatMessage, DataDictionary, InputCapture, InputMode, Role, SessionCommand, SessionEvent,
    SessionPhase, SessionState, UPLOAD_EXTENSIONS, dictionary_json, dictionary_markdown,
    markdown_file_name,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

/// Starter questions offered while the transcript is still empty.
pub const SUGGESTED_QUESTIONS: [&str; 4] = [
    "What columns contain PII?",
    "Write a SQL query for this table",
    "Explain the business logic",
    "Identify potential data types issues",
];

/// Outcome of a backend call, tagged with the token the request was issued
/// under so stale completions can be dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    GenerateCompleted { token: u64, dictionary: DataDictionary },
    GenerateFailed { token: u64, error: String },
    ChatCompleted { token: u64, reply: String },
    ChatFailed { token: u64, error: String },
}

impl ServiceEvent {
    pub const fn token(&self) -> u64 {
        match self {
            Self::GenerateCompleted { token, .. }
            | Self::GenerateFailed { token, .. }
            | Self::ChatCompleted { token, .. }
            | Self::ChatFailed { token, .. } => *token,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Service(ServiceEvent),
}

/// Bridge to the dictionary backend and the host environment. The synchronous
/// operations are what implementors provide; the `spawn_*` variants default to
/// running inline and posting the outcome on the internal channel, and a real
/// runtime overrides them to run on a worker thread.
pub trait AppRuntime {
    fn generate_dictionary(&mut self, raw: &str) -> Result<DataDictionary>;
    fn chat_turn(
        &mut self,
        dictionary: &DataDictionary,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String>;
    fn copy_to_clipboard(&mut self, text: &str) -> Result<()>;
    fn export_markdown(&mut self, file_name: &str, contents: &str) -> Result<PathBuf>;

    fn spawn_generate(&mut self, token: u64, raw: &str, tx: Sender<InternalEvent>) -> Result<()> {
        let event = match self.generate_dictionary(raw) {
            Ok(dictionary) => ServiceEvent::GenerateCompleted { token, dictionary },
            Err(error) => ServiceEvent::GenerateFailed {
                token,
                error: error.to_string(),
            },
        };
        tx.send(InternalEvent::Service(event))
            .map_err(|_| anyhow!("service event channel closed"))?;
        Ok(())
    }

    fn spawn_chat(
        &mut self,
        token: u64,
        dictionary: &DataDictionary,
        message: &str,
        history: &[ChatMessage],
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.chat_turn(dictionary, message, history) {
            Ok(reply) => ServiceEvent::ChatCompleted { token, reply },
            Err(error) => ServiceEvent::ChatFailed {
                token,
                error: error.to_string(),
            },
        };
        tx.send(InternalEvent::Service(event))
            .map_err(|_| anyhow!("service event channel closed"))?;
        Ok(())
    }
}

/// UI-only state: capture buffers, the chat compose line, and the transient
/// status line. Session semantics live in `SessionState`.
#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    input: InputCapture,
    path_input: String,
    chat_input: String,
    suggestion_cursor: Option<usize>,
    status_line: String,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut SessionState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut SessionState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status_line.clear();
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Service(event) => {
                handle_service_event(state, view_data, tx, event);
            }
        }
    }
}

fn handle_service_event(
    state: &mut SessionState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: ServiceEvent,
) {
    let command = match event {
        ServiceEvent::GenerateCompleted { token, dictionary } => {
            SessionCommand::GenerateSucceeded { token, dictionary }
        }
        ServiceEvent::GenerateFailed { token, error } => SessionCommand::GenerateFailed {
            token,
            message: error,
        },
        ServiceEvent::ChatCompleted { token, reply } => {
            SessionCommand::ChatSucceeded { token, reply }
        }
        ServiceEvent::ChatFailed { token, error } => {
            // Chat failures degrade into the scripted apology turn; the detail
            // is only kept in the log.
            tracing::warn!(%error, "chat turn failed");
            SessionCommand::ChatFailed { token }
        }
    };

    for outcome in state.dispatch(command) {
        match outcome {
            SessionEvent::DictionaryReady => {
                emit_status(view_data, tx, "dictionary ready");
            }
            SessionEvent::StaleResponseDiscarded { token } => {
                tracing::debug!(token, "discarded stale backend response");
            }
            _ => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status_line = message.into();
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
        state.dispatch(SessionCommand::Reset);
        view_data.input.clear();
        view_data.path_input.clear();
        view_data.chat_input.clear();
        view_data.suggestion_cursor = None;
        emit_status(view_data, internal_tx, "session reset");
        return false;
    }

    if state.dictionary.is_some() {
        handle_workspace_key(state, runtime, view_data, internal_tx, key);
    } else {
        handle_capture_key(state, runtime, view_data, internal_tx, key);
    }
    false
}

fn handle_capture_key<R: AppRuntime>(
    state: &mut SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    // Editing is frozen while a generation is outstanding, like the rest of
    // the capture surface.
    if state.loading {
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if key.code == KeyCode::Char('s') && ctrl {
        submit_capture(state, runtime, view_data, internal_tx);
        return;
    }

    match key.code {
        KeyCode::Tab => view_data.input.toggle_mode(),
        _ => match view_data.input.mode {
            InputMode::Paste => match key.code {
                KeyCode::Char('u') if ctrl => view_data.input.clear(),
                KeyCode::Char(ch) if !ctrl => view_data.input.text.push(ch),
                KeyCode::Enter => view_data.input.text.push('\n'),
                KeyCode::Backspace => {
                    view_data.input.text.pop();
                }
                _ => {}
            },
            InputMode::Upload => match key.code {
                KeyCode::Char(ch) if !ctrl => view_data.path_input.push(ch),
                KeyCode::Backspace => {
                    view_data.path_input.pop();
                }
                KeyCode::Enter => load_capture_file(view_data, internal_tx),
                _ => {}
            },
        },
    }
}

fn submit_capture<R: AppRuntime>(
    state: &mut SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !view_data.input.can_submit() {
        emit_status(view_data, internal_tx, "nothing to submit");
        return;
    }

    let raw = view_data.input.text.clone();
    for event in state.dispatch(SessionCommand::Submit { raw }) {
        if let SessionEvent::GenerateRequested { token, raw } = event {
            emit_status(view_data, internal_tx, "analyzing data");
            if let Err(error) = runtime.spawn_generate(token, &raw, internal_tx.clone()) {
                state.dispatch(SessionCommand::GenerateFailed {
                    token,
                    message: error.to_string(),
                });
            }
        }
    }
}

fn load_capture_file(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    let path = view_data.path_input.trim().to_owned();
    if path.is_empty() {
        emit_status(view_data, internal_tx, "enter a file path");
        return;
    }

    match view_data.input.load_file(Path::new(&path)) {
        Ok(chars) => {
            let name = view_data
                .input
                .loaded_file
                .clone()
                .unwrap_or_else(|| path.clone());
            emit_status(
                view_data,
                internal_tx,
                format!("loaded {name} ({chars} chars)"),
            );
        }
        Err(error) => emit_status(view_data, internal_tx, format!("{error:#}")),
    }
}

fn handle_workspace_key<R: AppRuntime>(
    state: &mut SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('y') if ctrl => copy_dictionary_json(state, runtime, view_data, internal_tx),
        KeyCode::Char('d') if ctrl => {
            export_dictionary_markdown(state, runtime, view_data, internal_tx);
        }
        KeyCode::Enter => submit_chat_input(state, runtime, view_data, internal_tx),
        KeyCode::Up if state.chat_history.is_empty() && !state.chat_loading => {
            cycle_suggestion(view_data, -1);
        }
        KeyCode::Down if state.chat_history.is_empty() && !state.chat_loading => {
            cycle_suggestion(view_data, 1);
        }
        KeyCode::Char(ch) if !ctrl && !state.chat_loading => {
            view_data.chat_input.push(ch);
            view_data.suggestion_cursor = None;
        }
        KeyCode::Backspace if !state.chat_loading => {
            view_data.chat_input.pop();
        }
        _ => {}
    }
}

fn cycle_suggestion(view_data: &mut ViewData, step: isize) {
    let count = SUGGESTED_QUESTIONS.len() as isize;
    let next = match view_data.suggestion_cursor {
        None if step > 0 => 0,
        None => SUGGESTED_QUESTIONS.len() - 1,
        Some(index) => (index as isize + step).rem_euclid(count) as usize,
    };
    view_data.suggestion_cursor = Some(next);
    view_data.chat_input = SUGGESTED_QUESTIONS[next].to_owned();
}

fn submit_chat_input<R: AppRuntime>(
    state: &mut SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let content = view_data.chat_input.trim().to_owned();
    if content.is_empty() {
        return;
    }

    for event in state.dispatch(SessionCommand::SendMessage { content }) {
        match event {
            SessionEvent::ChatRequested {
                token,
                message,
                history,
            } => {
                view_data.chat_input.clear();
                view_data.suggestion_cursor = None;
                let Some(dictionary) = state.dictionary.clone() else {
                    return;
                };
                if let Err(error) =
                    runtime.spawn_chat(token, &dictionary, &message, &history, internal_tx.clone())
                {
                    tracing::warn!(%error, "chat dispatch failed");
                    state.dispatch(SessionCommand::ChatFailed { token });
                }
            }
            SessionEvent::CommandIgnored if state.chat_loading => {
                emit_status(view_data, internal_tx, "still waiting on the last reply");
            }
            _ => {}
        }
    }
}

fn copy_dictionary_json<R: AppRuntime>(
    state: &SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(dictionary) = &state.dictionary else {
        return;
    };

    let status = match dictionary_json(dictionary) {
        Ok(json) => match runtime.copy_to_clipboard(&json) {
            Ok(()) => "dictionary copied as JSON".to_owned(),
            Err(error) => format!("copy failed: {error:#}"),
        },
        Err(error) => format!("copy failed: {error:#}"),
    };
    emit_status(view_data, internal_tx, status);
}

fn export_dictionary_markdown<R: AppRuntime>(
    state: &SessionState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(dictionary) = &state.dictionary else {
        return;
    };

    let markdown = dictionary_markdown(dictionary);
    let file_name = markdown_file_name(&dictionary.table_name);
    let status = match runtime.export_markdown(&file_name, &markdown) {
        Ok(path) => format!("exported {}", path.display()),
        Err(error) => format!("export failed: {error:#}"),
    };
    emit_status(view_data, internal_tx, status);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &SessionState, view_data: &ViewData) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_title(frame, chunks[0], state);
    if state.dictionary.is_some() {
        render_workspace(frame, chunks[1], state, view_data);
    } else {
        render_capture(frame, chunks[1], state, view_data);
    }
    render_status(frame, chunks[2], state, view_data);
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Input => "input",
        SessionPhase::Generating => "generating",
        SessionPhase::Ready => "ready",
        SessionPhase::AwaitingReply => "awaiting reply",
        SessionPhase::GenerationFailed => "failed",
    }
}

fn render_title(frame: &mut ratatui::Frame<'_>, area: Rect, state: &SessionState) {
    let title = Line::from(vec![
        Span::styled("datadict", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  [{}]", phase_label(state.phase()))),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn render_capture(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &SessionState,
    view_data: &ViewData,
) {
    let mut constraints = vec![Constraint::Length(1)];
    if state.error.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(4));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let selected = match view_data.input.mode {
        InputMode::Paste => 0,
        InputMode::Upload => 1,
    };
    let tabs = Tabs::new(vec![InputMode::Paste.label(), InputMode::Upload.label()])
        .select(selected)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, chunks[0]);

    let mut next = 1;
    if let Some(error) = &state.error {
        let banner = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("error"));
        frame.render_widget(banner, chunks[next]);
        next += 1;
    }

    let body = Paragraph::new(capture_body_text(state, view_data))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(capture_body_title(state, view_data)),
        );
    frame.render_widget(body, chunks[next]);
}

fn capture_body_title(state: &SessionState, view_data: &ViewData) -> String {
    if state.loading {
        return "analyzing data...".to_owned();
    }
    match view_data.input.mode {
        InputMode::Paste => "paste raw data".to_owned(),
        InputMode::Upload => format!("file path ({})", UPLOAD_EXTENSIONS.join(", ")),
    }
}

fn capture_body_text(state: &SessionState, view_data: &ViewData) -> String {
    if state.loading {
        return view_data.input.text.clone();
    }
    match view_data.input.mode {
        InputMode::Paste => view_data.input.text.clone(),
        InputMode::Upload => {
            let mut text = format!("> {}", view_data.path_input);
            if let Some(name) = &view_data.input.loaded_file {
                text.push_str(&format!(
                    "\nloaded: {name} ({} chars)",
                    view_data.input.text.chars().count(),
                ));
            }
            text
        }
    }
}

fn render_workspace(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &SessionState,
    view_data: &ViewData,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    render_dictionary(frame, columns[0], state);
    render_chat(frame, columns[1], state, view_data);
}

fn render_dictionary(frame: &mut ratatui::Frame<'_>, area: Rect, state: &SessionState) {
    let Some(dictionary) = &state.dictionary else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let summary = Paragraph::new(dictionary.summary.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(dictionary.table_name.as_str()),
        );
    frame.render_widget(summary, chunks[0]);

    let header = Row::new(
        ["column", "type", "description", "constraints", "examples"].map(|label| {
            Cell::from(label).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        }),
    );

    let rows = dictionary.columns.iter().map(|column| {
        // Display caps examples at three; the Markdown export has its own
        // two-value cap.
        let examples = column
            .example_values
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let description = match &column.business_logic {
            Some(logic) => format!("{}; rule: {logic}", column.description),
            None => column.description.clone(),
        };
        Row::new(vec![
            Cell::from(column.name.clone()),
            Cell::from(column.inferred_type.clone()),
            Cell::from(description),
            Cell::from(column.constraints.join(", ")),
            Cell::from(examples),
        ])
    });

    let widths = [
        Constraint::Percentage(16),
        Constraint::Percentage(12),
        Constraint::Percentage(34),
        Constraint::Percentage(20),
        Constraint::Percentage(18),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL).title("columns"));
    frame.render_widget(table, chunks[1]);
}

fn render_chat(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &SessionState,
    view_data: &ViewData,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let rows = if state.chat_history.is_empty() && !state.chat_loading {
        let mut rows = vec!["try one of these (up/down, enter):".to_owned()];
        rows.extend(suggestion_rows(view_data));
        rows
    } else {
        transcript_rows(state)
    };
    let lines = rows.into_iter().map(Line::from).collect::<Vec<_>>();
    let transcript = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("chat"));
    frame.render_widget(transcript, chunks[0]);

    let compose_title = if state.chat_loading {
        "waiting for reply"
    } else {
        "message"
    };
    let compose = Paragraph::new(format!("> {}", view_data.chat_input)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(compose_title),
    );
    frame.render_widget(compose, chunks[1]);
}

fn speaker_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Model => "ai",
    }
}

/// Transcript as display rows. A pending model turn renders as an ellipsis
/// placeholder until its reply (or the apology) lands.
fn transcript_rows(state: &SessionState) -> Vec<String> {
    let mut rows = state
        .chat_history
        .iter()
        .map(|message| format!("{}: {}", speaker_label(message.role), message.content))
        .collect::<Vec<_>>();
    if state.chat_loading {
        rows.push(format!("{}: ...", speaker_label(Role::Model)));
    }
    rows
}

fn suggestion_rows(view_data: &ViewData) -> Vec<String> {
    SUGGESTED_QUESTIONS
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let marker = if view_data.suggestion_cursor == Some(index) {
                ">"
            } else {
                " "
            };
            format!("{marker} {question}")
        })
        .collect()
}

fn render_status(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &SessionState,
    view_data: &ViewData,
) {
    let text = status_text(state, view_data);
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn status_text(state: &SessionState, view_data: &ViewData) -> String {
    if !view_data.status_line.is_empty() {
        return view_data.status_line.clone();
    }
    if state.dictionary.is_some() {
        "enter send | ctrl+y copy json | ctrl+d export | ctrl+r reset | ctrl+q quit".to_owned()
    } else {
        "tab source | ctrl+s submit | ctrl+r reset | ctrl+q quit".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, SUGGESTED_QUESTIONS, ViewData, handle_key_event,
        process_internal_events, status_text, suggestion_rows, transcript_rows,
    };
    use anyhow::Result;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use datadict_app::{
        CHAT_APOLOGY, ChatMessage, DataDictionary, SessionPhase, SessionState,
    };
    use datadict_testkit::{ScriptedBackend, sample_dictionary};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Default)]
    struct ScriptedRuntime {
        backend: ScriptedBackend,
        clipboard: Vec<String>,
        exports: Vec<(String, String)>,
    }

    impl AppRuntime for ScriptedRuntime {
        fn generate_dictionary(&mut self, raw: &str) -> Result<DataDictionary> {
            self.backend.generate_dictionary(raw)
        }

        fn chat_turn(
            &mut self,
            dictionary: &DataDictionary,
            message: &str,
            history: &[ChatMessage],
        ) -> Result<String> {
            self.backend.chat_turn(dictionary, message, history)
        }

        fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
            self.clipboard.push(text.to_owned());
            Ok(())
        }

        fn export_markdown(&mut self, file_name: &str, contents: &str) -> Result<PathBuf> {
            self.exports.push((file_name.to_owned(), contents.to_owned()));
            Ok(PathBuf::from(file_name))
        }
    }

    struct Harness {
        state: SessionState,
        view_data: ViewData,
        runtime: ScriptedRuntime,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                state: SessionState::default(),
                view_data: ViewData::default(),
                runtime: ScriptedRuntime::default(),
                tx,
                rx,
            }
        }

        fn key(&mut self, key: KeyEvent) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key,
            )
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                let key = if ch == '\n' {
                    plain(KeyCode::Enter)
                } else {
                    plain(KeyCode::Char(ch))
                };
                self.key(key);
            }
        }

        fn pump(&mut self) {
            process_internal_events(&mut self.state, &mut self.view_data, &self.tx, &self.rx);
        }

        /// Submit queued sample data and drive the session to `Ready`.
        fn make_ready(&mut self) {
            self.runtime.backend.queue_generate_ok(sample_dictionary());
            self.view_data.input.text = "a,b\n1,2".to_owned();
            self.key(ctrl('s'));
            self.pump();
            assert_eq!(self.state.phase(), SessionPhase::Ready);
        }
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn plain(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn ctrl_q_quits() {
        let mut harness = Harness::new();
        assert!(harness.key(ctrl('q')));
    }

    #[test]
    fn submitting_pasted_text_produces_a_dictionary() {
        let mut harness = Harness::new();
        harness.runtime.backend.queue_generate_ok(sample_dictionary());

        harness.type_text("a,b\n1,2");
        harness.key(ctrl('s'));
        harness.pump();

        assert_eq!(harness.state.phase(), SessionPhase::Ready);
        let dictionary = harness.state.dictionary.as_ref().expect("dictionary");
        assert_eq!(dictionary.table_name, "Customer Orders");
        assert_eq!(harness.runtime.backend.generate_calls, vec!["a,b\n1,2"]);
    }

    #[test]
    fn blank_submit_reports_nothing_to_submit() {
        let mut harness = Harness::new();
        harness.key(ctrl('s'));

        assert_eq!(harness.view_data.status_line, "nothing to submit");
        assert!(harness.runtime.backend.generate_calls.is_empty());
        assert_eq!(harness.state.phase(), SessionPhase::Input);
    }

    #[test]
    fn generate_failure_surfaces_the_error() {
        let mut harness = Harness::new();
        harness.runtime.backend.queue_generate_err("model unavailable");

        harness.type_text("a,b");
        harness.key(ctrl('s'));
        harness.pump();

        assert_eq!(harness.state.phase(), SessionPhase::GenerationFailed);
        assert_eq!(harness.state.error.as_deref(), Some("model unavailable"));
    }

    #[test]
    fn upload_enter_loads_the_named_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("orders.csv");
        fs::write(&path, "a,b\n1,2")?;

        let mut harness = Harness::new();
        harness.key(plain(KeyCode::Tab));
        harness.type_text(&path.display().to_string());
        harness.key(plain(KeyCode::Enter));

        assert_eq!(harness.view_data.input.text, "a,b\n1,2");
        assert_eq!(
            harness.view_data.input.loaded_file.as_deref(),
            Some("orders.csv")
        );
        assert!(harness.view_data.status_line.starts_with("loaded orders.csv"));
        Ok(())
    }

    #[test]
    fn upload_load_failure_sets_a_status() {
        let mut harness = Harness::new();
        harness.key(plain(KeyCode::Tab));
        harness.type_text("/nonexistent/input.csv");
        harness.key(plain(KeyCode::Enter));

        assert!(harness.view_data.status_line.contains("read input file"));
        assert!(harness.view_data.input.text.is_empty());
    }

    #[test]
    fn typing_is_frozen_while_generating() {
        let mut harness = Harness::new();
        harness.runtime.backend.queue_generate_ok(sample_dictionary());
        harness.type_text("a,b");
        harness.key(ctrl('s'));
        // Completion still queued on the channel; the session is mid-flight.
        assert!(harness.state.loading);

        harness.type_text("zzz");
        assert_eq!(harness.view_data.input.text, "a,b");
    }

    #[test]
    fn chat_enter_round_trip_appends_both_turns() {
        let mut harness = Harness::new();
        harness.make_ready();
        harness.runtime.backend.queue_chat_ok("None detected.");

        harness.type_text("What columns contain PII?");
        harness.key(plain(KeyCode::Enter));
        harness.pump();

        assert_eq!(harness.state.chat_history.len(), 2);
        assert_eq!(harness.state.chat_history[1].content, "None detected.");
        assert!(harness.view_data.chat_input.is_empty());
        assert_eq!(
            harness.runtime.backend.chat_calls,
            vec![("What columns contain PII?".to_owned(), 0)],
        );
    }

    #[test]
    fn chat_failure_appends_the_apology() {
        let mut harness = Harness::new();
        harness.make_ready();
        harness.runtime.backend.queue_chat_err("backend exploded");

        harness.type_text("anything");
        harness.key(plain(KeyCode::Enter));
        harness.pump();

        assert_eq!(harness.state.error, None);
        assert_eq!(harness.state.chat_history.len(), 2);
        assert_eq!(harness.state.chat_history[1].content, CHAT_APOLOGY);
    }

    #[test]
    fn compose_is_inert_while_awaiting_a_reply() {
        let mut harness = Harness::new();
        harness.make_ready();
        harness.runtime.backend.queue_chat_ok("first answer");

        harness.type_text("first");
        harness.key(plain(KeyCode::Enter));
        // Reply not yet pumped; a second send must be ignored.
        assert!(harness.state.chat_loading);

        harness.type_text("second");
        assert!(harness.view_data.chat_input.is_empty());

        harness.view_data.chat_input = "second".to_owned();
        harness.key(plain(KeyCode::Enter));
        assert_eq!(harness.state.chat_history.len(), 1);
        assert_eq!(
            harness.view_data.status_line,
            "still waiting on the last reply"
        );
    }

    #[test]
    fn stale_generation_after_reset_is_dropped() {
        let mut harness = Harness::new();
        harness.runtime.backend.queue_generate_ok(sample_dictionary());
        harness.type_text("a,b");
        harness.key(ctrl('s'));

        harness.key(ctrl('r'));
        harness.pump();

        assert_eq!(harness.state.dictionary, None);
        assert_eq!(harness.state.phase(), SessionPhase::Input);
        assert!(harness.view_data.input.text.is_empty());
    }

    #[test]
    fn arrow_keys_cycle_the_suggested_questions() {
        let mut harness = Harness::new();
        harness.make_ready();

        harness.key(plain(KeyCode::Down));
        assert_eq!(harness.view_data.chat_input, SUGGESTED_QUESTIONS[0]);
        harness.key(plain(KeyCode::Down));
        assert_eq!(harness.view_data.chat_input, SUGGESTED_QUESTIONS[1]);
        harness.key(plain(KeyCode::Up));
        assert_eq!(harness.view_data.chat_input, SUGGESTED_QUESTIONS[0]);

        let rows = suggestion_rows(&harness.view_data);
        assert!(rows[0].starts_with("> "));
        assert!(rows[1].starts_with("  "));
    }

    #[test]
    fn ctrl_y_copies_pretty_json() {
        let mut harness = Harness::new();
        harness.make_ready();

        harness.key(ctrl('y'));

        assert_eq!(harness.view_data.status_line, "dictionary copied as JSON");
        assert_eq!(harness.runtime.clipboard.len(), 1);
        assert!(harness.runtime.clipboard[0].contains("\"table_name\": \"Customer Orders\""));
    }

    #[test]
    fn ctrl_d_exports_markdown_under_the_slug_name() {
        let mut harness = Harness::new();
        harness.make_ready();

        harness.key(ctrl('d'));

        assert_eq!(harness.runtime.exports.len(), 1);
        let (file_name, contents) = &harness.runtime.exports[0];
        assert_eq!(file_name, "customer_orders_dictionary.md");
        assert!(contents.starts_with("# Data Dictionary: Customer Orders"));
        assert_eq!(
            harness.view_data.status_line,
            "exported customer_orders_dictionary.md"
        );
    }

    #[test]
    fn status_clear_only_applies_to_the_matching_token() {
        let mut harness = Harness::new();
        harness.key(ctrl('s'));
        assert_eq!(harness.view_data.status_line, "nothing to submit");
        let token = harness.view_data.status_token;

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: token + 1 })
            .expect("send");
        harness.pump();
        assert_eq!(harness.view_data.status_line, "nothing to submit");

        harness
            .tx
            .send(InternalEvent::ClearStatus { token })
            .expect("send");
        harness.pump();
        assert!(harness.view_data.status_line.is_empty());
    }

    #[test]
    fn transcript_shows_a_pending_marker_while_loading() {
        let mut harness = Harness::new();
        harness.make_ready();
        harness.runtime.backend.queue_chat_ok("answer");
        harness.type_text("question");
        harness.key(plain(KeyCode::Enter));

        let rows = transcript_rows(&harness.state);
        assert_eq!(rows, vec!["you: question".to_owned(), "ai: ...".to_owned()]);

        harness.pump();
        let rows = transcript_rows(&harness.state);
        assert_eq!(rows, vec!["you: question".to_owned(), "ai: answer".to_owned()]);
    }

    #[test]
    fn status_hints_track_the_active_screen() {
        let mut harness = Harness::new();
        let hint = status_text(&harness.state, &harness.view_data);
        assert!(hint.contains("ctrl+s submit"));

        harness.make_ready();
        harness.view_data.status_line.clear();
        let hint = status_text(&harness.state, &harness.view_data);
        assert!(hint.contains("ctrl+d export"));
    }
}
