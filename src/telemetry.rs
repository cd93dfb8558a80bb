use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// JSON-lines trace file; `ASKTTY_TRACE_LOG` moves it.
pub fn tracing_log_path() -> PathBuf {
    env::var("ASKTTY_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("asktty_trace.jsonl"))
}

/// Install the structured subscriber that records relay lifecycle events.
/// A no-op unless file logging is enabled, and only ever installed once.
pub fn init_tracing(config: &AppConfig) {
    if !config.logging_enabled() {
        return;
    }
    TRACING_INIT.get_or_init(|| {
        let path = tracing_log_path();
        let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
            crate::log_debug(&format!("trace log unavailable: {}", path.display()));
            return;
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_target(false)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            crate::log_debug("tracing subscriber already installed");
        }
    });
}
