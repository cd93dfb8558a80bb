//! Interactive session: the mode state machine, prompt commands, and the
//! file logging it reports through.

mod commands;
mod logging;
mod session;

pub use commands::{complete, Command, Completion, COMMANDS, HELP_TEXT};
#[cfg(test)]
pub(crate) use logging::set_logging_for_tests;
pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
pub use session::{
    ClientFactory, Flow, ModeKind, Session, SessionEvent, Submission, MISSING_API_KEY,
    SPINNER_FRAMES,
};
