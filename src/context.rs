//! System prompt assembly.

use std::env;

const BASE_INSTRUCTIONS: &str = "You are asktty, a terminal assistant. Rules:
- Be direct: no filler, greetings, or unnecessary preamble
- Give complete, useful answers; include full code examples and explanations when the question warrants it
- For simple questions, keep it brief. For complex questions, give a thorough response
- Never repeat or echo the working directory back to the user";

/// Build the system message, optionally noting the working directory and
/// appending the user's own instructions.
pub fn build_system_message(include_cwd: bool, custom_instructions: &str) -> String {
    let cwd = if include_cwd {
        env::current_dir()
            .ok()
            .map(|dir| dir.display().to_string())
    } else {
        None
    };
    compose_system_message(cwd.as_deref(), custom_instructions)
}

fn compose_system_message(cwd: Option<&str>, custom_instructions: &str) -> String {
    let mut message = String::from(BASE_INSTRUCTIONS);
    if let Some(cwd) = cwd {
        message.push_str(&format!(
            "\n[Context: user is in {cwd}; do NOT mention this unless they ask]"
        ));
    }
    let custom = custom_instructions.trim();
    if !custom.is_empty() {
        message.push_str("\n\nUser's custom instructions:\n");
        message.push_str(custom);
    }
    message
}
