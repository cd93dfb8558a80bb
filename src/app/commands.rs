//! Slash commands recognised at the prompt, plus their tab completion.

/// Every command, in the order completion offers them.
pub const COMMANDS: &[&str] = &["/settings", "/help", "/clear"];

pub const HELP_TEXT: &str = "Commands:
  /settings   Configure API key, model, and preferences
  /clear      Clear the response
  /help       Show this help

Shortcuts:
  Enter       Submit query
  Tab         Autocomplete commands
  Ctrl+O      Open a long answer in the pager
  Esc         Quit (or cancel streaming)
  Ctrl+C      Quit from anywhere

Pager:
  Up/Down j/k scroll, PgUp/PgDn page, g/G top/end, q or Esc close";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Settings,
    Help,
    Clear,
}

impl Command {
    /// Exact (case-insensitive) match on already-trimmed input.
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "/settings" => Some(Command::Settings),
            "/help" => Some(Command::Help),
            "/clear" => Some(Command::Clear),
            _ => None,
        }
    }
}

/// Result of pressing Tab on the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Replacement prompt text, when the completion extends what was typed.
    pub text: Option<String>,
    /// Ghost text shown after the cursor.
    pub hint: Option<String>,
}

/// Complete a partially typed command. `None` when the text is not a command
/// prefix or nothing matches.
pub fn complete(text: &str) -> Option<Completion> {
    if !text.starts_with('/') {
        return None;
    }
    let prefix = text.to_lowercase();
    let matches: Vec<&str> = COMMANDS
        .iter()
        .copied()
        .filter(|command| command.starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [] => None,
        [only] => Some(Completion {
            text: Some((*only).to_string()),
            hint: None,
        }),
        [first, rest @ ..] => {
            let common = rest
                .iter()
                .fold(*first, |common, command| common_prefix(common, command));
            let text = (common.len() > text.len()).then(|| common.to_string());
            let hint = first
                .get(common.len()..)
                .filter(|rest| !rest.is_empty())
                .map(str::to_string);
            Some(Completion { text, hint })
        }
    }
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, ca), cb)| ca == cb)
        .last()
        .map(|((idx, ca), _)| idx + ca.len_utf8())
        .unwrap_or(0);
    &a[..len]
}
