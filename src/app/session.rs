use super::commands::{self, Command, HELP_TEXT};
use crate::buffer::ResponseBuffer;
use crate::config::{Settings, SettingsStore};
use crate::context::build_system_message;
use crate::provider::{ChatMessage, CompletionClient};
use crate::relay::{ActiveRelay, RelayEvent, RelayEventKind, RelayId, RelayListener, RelayOutcome};
use crate::ui::content_width;
use crate::ui::input::ComposeInput;
use crate::ui::settings::{FormAction, SettingsForm, SettingsSubmission};
use crate::{log_debug, log_debug_content};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::mem;
use std::sync::Arc;

/// Braille spinner shown after the streamed text.
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
pub const MISSING_API_KEY: &str = "no API key set; run /settings or set OPENAI_API_KEY";
/// Rows of chrome around the response (borders, prompt, status, spacing).
const RESPONSE_CHROME_ROWS: usize = 8;
const MIN_RESPONSE_ROWS: usize = 3;

/// Builds the completion client for a given set of settings.
pub type ClientFactory = Box<dyn Fn(&Settings) -> Result<Arc<dyn CompletionClient>>>;

pub enum Mode {
    Input,
    Streaming(ActiveRelay),
    Pager,
    Settings(SettingsForm),
}

/// Payload-free view of `Mode` for rendering and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Input,
    Streaming,
    Pager,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Key(KeyEvent),
    Relay(RelayEvent),
    Resize { width: u16, height: u16 },
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What became of a submitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Blank input.
    Ignored,
    Command(Command),
    MissingCredential,
    Started(RelayId),
    /// Another mode owns the screen; nothing changed.
    Rejected,
}

/// All interactive state. Owned by the render loop and only ever mutated there.
pub struct Session {
    mode: Mode,
    compose: ComposeInput,
    last_query: Option<String>,
    error: Option<String>,
    buffer: ResponseBuffer,
    settings: Settings,
    client: Arc<dyn CompletionClient>,
    client_factory: ClientFactory,
    store: Box<dyn SettingsStore>,
    next_relay_id: RelayId,
    spinner_frame: usize,
}

impl Session {
    pub fn new(
        settings: Settings,
        client_factory: ClientFactory,
        store: Box<dyn SettingsStore>,
    ) -> Result<Self> {
        let client = client_factory(&settings)?;
        Ok(Self {
            mode: Mode::Input,
            compose: ComposeInput::new(),
            last_query: None,
            error: None,
            buffer: ResponseBuffer::new(settings.max_compact_lines()),
            settings,
            client,
            client_factory,
            store,
            next_relay_id: 1,
            spinner_frame: 0,
        })
    }

    pub fn mode(&self) -> ModeKind {
        match self.mode {
            Mode::Input => ModeKind::Input,
            Mode::Streaming(_) => ModeKind::Streaming,
            Mode::Pager => ModeKind::Pager,
            Mode::Settings(_) => ModeKind::Settings,
        }
    }

    pub fn compose(&self) -> &ComposeInput {
        &self.compose
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn buffer(&self) -> &ResponseBuffer {
        &self.buffer
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn settings_form(&self) -> Option<&SettingsForm> {
        match &self.mode {
            Mode::Settings(form) => Some(form),
            _ => None,
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    /// Receivers for the active relay, or never-firing ones when idle.
    pub fn listener(&self) -> RelayListener {
        match &self.mode {
            Mode::Streaming(relay) => relay.listener(),
            _ => RelayListener::idle(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.mode, Mode::Streaming(_))
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Flow {
        match event {
            SessionEvent::Key(key) => return self.handle_key(key),
            SessionEvent::Relay(event) => self.handle_relay_event(event),
            SessionEvent::Resize { width, height } => {
                self.buffer.set_wrap_width(content_width(width));
                self.set_viewport_height(height);
            }
            SessionEvent::Tick => {
                if self.is_streaming() {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                }
            }
        }
        Flow::Continue
    }

    /// Size the pager from the rows available to the box.
    pub fn set_viewport_height(&mut self, rows: u16) {
        let height = usize::from(rows)
            .saturating_sub(RESPONSE_CHROME_ROWS)
            .max(MIN_RESPONSE_ROWS);
        self.buffer.set_visible_height(height);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind == KeyEventKind::Release {
            return Flow::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.shutdown();
            return Flow::Quit;
        }
        match self.mode {
            Mode::Input => return self.handle_input_key(key),
            Mode::Streaming(_) => {
                if key.code == KeyCode::Esc {
                    self.cancel_stream();
                }
            }
            Mode::Pager => self.handle_pager_key(key),
            Mode::Settings(_) => self.handle_settings_key(key),
        }
        Flow::Continue
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Flow {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code != KeyCode::Tab {
            self.compose.set_hint(None);
        }
        match key.code {
            KeyCode::Esc => {
                self.shutdown();
                return Flow::Quit;
            }
            KeyCode::Enter => {
                let text = self.compose.text().to_string();
                self.submit(&text);
            }
            KeyCode::Tab => self.complete_command(),
            KeyCode::Char('o') if ctrl => self.open_pager(),
            _ => {
                self.compose.handle_key(&key);
            }
        }
        Flow::Continue
    }

    fn handle_pager_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.mode = Mode::Input,
            KeyCode::Up | KeyCode::Char('k') => self.buffer.scroll_up(),
            KeyCode::Down | KeyCode::Char('j') => self.buffer.scroll_down(),
            KeyCode::PageUp | KeyCode::Char('b') => self.buffer.page_up(),
            KeyCode::PageDown | KeyCode::Char(' ') => self.buffer.page_down(),
            KeyCode::Home | KeyCode::Char('g') => self.buffer.to_top(),
            KeyCode::End | KeyCode::Char('G') => self.buffer.to_bottom(),
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.mode = Mode::Input;
            return;
        }
        let action = match &mut self.mode {
            Mode::Settings(form) => form.handle_key(&key),
            _ => FormAction::None,
        };
        if let FormAction::Save(submission) = action {
            self.apply_settings(submission);
        }
    }

    /// Handle a submitted prompt line.
    pub fn submit(&mut self, text: &str) -> Submission {
        if !matches!(self.mode, Mode::Input) {
            log_debug("submission rejected: session is not accepting input");
            return Submission::Rejected;
        }
        let query = text.trim();
        if query.is_empty() {
            return Submission::Ignored;
        }
        if let Some(command) = Command::parse(query) {
            self.compose.clear();
            self.run_command(command);
            return Submission::Command(command);
        }
        if !self.settings.has_api_key() {
            self.error = Some(MISSING_API_KEY.to_string());
            self.compose.clear();
            return Submission::MissingCredential;
        }
        let query = query.to_string();
        self.compose.clear();
        Submission::Started(self.begin_stream(query))
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::Settings => {
                self.mode = Mode::Settings(SettingsForm::from_settings(&self.settings));
            }
            Command::Clear => {
                self.buffer.clear();
                self.error = None;
            }
            Command::Help => self.buffer.set_text(HELP_TEXT),
        }
    }

    fn begin_stream(&mut self, query: String) -> RelayId {
        let id = self.next_relay_id;
        self.next_relay_id += 1;
        self.buffer.clear();
        self.error = None;
        self.spinner_frame = 0;
        log_debug_content(&format!("relay {id}: query {query:?}"));
        let messages = vec![
            ChatMessage::system(build_system_message(
                self.settings.context.include_cwd,
                &self.settings.custom_instructions,
            )),
            ChatMessage::user(query.clone()),
        ];
        self.last_query = Some(query);
        let relay = ActiveRelay::start(id, Arc::clone(&self.client), messages);
        self.mode = Mode::Streaming(relay);
        id
    }

    fn handle_relay_event(&mut self, event: RelayEvent) {
        let active = match &self.mode {
            Mode::Streaming(relay) => relay.id(),
            _ => {
                log_debug(&format!("relay {}: event after stream ended", event.relay_id));
                return;
            }
        };
        if event.relay_id != active {
            log_debug(&format!(
                "relay {}: stale event ignored (active {active})",
                event.relay_id
            ));
            return;
        }
        match event.kind {
            RelayEventKind::Chunk(chunk) => self.append_chunk(&chunk),
            RelayEventKind::Done(outcome) => self.finish_stream(outcome),
        }
    }

    fn finish_stream(&mut self, outcome: RelayOutcome) {
        if let Mode::Streaming(relay) = mem::replace(&mut self.mode, Mode::Input) {
            for chunk in relay.drain_pending() {
                self.append_chunk(&chunk);
            }
            relay.finish();
        }
        match outcome {
            RelayOutcome::Completed | RelayOutcome::Cancelled => {
                if self.buffer.is_overflowing() {
                    self.buffer.to_top();
                    self.mode = Mode::Pager;
                }
            }
            RelayOutcome::Failed(message) => self.error = Some(message),
        }
    }

    fn append_chunk(&mut self, chunk: &str) {
        let clean = strip_ansi_escapes::strip_str(chunk);
        self.buffer.append(&clean);
    }

    /// Stop the active stream and return to the prompt. Whatever text already
    /// arrived stays in the buffer.
    pub fn cancel_stream(&mut self) {
        if let Mode::Streaming(relay) = mem::replace(&mut self.mode, Mode::Input) {
            relay.abandon();
        }
    }

    /// Cancel any work in flight before the process exits.
    pub fn shutdown(&mut self) {
        self.cancel_stream();
    }

    fn complete_command(&mut self) {
        let Some(completion) = commands::complete(self.compose.text()) else {
            return;
        };
        if let Some(text) = completion.text {
            self.compose.set_text(&text);
        }
        self.compose.set_hint(completion.hint);
    }

    fn open_pager(&mut self) {
        if self.buffer.is_overflowing() {
            self.buffer.to_top();
            self.mode = Mode::Pager;
        }
    }

    fn apply_settings(&mut self, submission: SettingsSubmission) {
        submission.apply_to(&mut self.settings);
        self.buffer.set_max_compact_lines(self.settings.max_compact_lines());
        self.error = None;
        self.mode = Mode::Input;
        match (self.client_factory)(&self.settings) {
            Ok(client) => self.client = client,
            Err(err) => self.error = Some(format!("{err:#}")),
        }
        if let Err(err) = self.store.save(&self.settings) {
            log_debug(&format!("settings save failed: {err:#}"));
            self.error = Some(format!("failed to save settings: {err:#}"));
        }
    }
}
