//! Debug and crash logs in the temp dir. The TUI owns the terminal, so nothing
//! here ever prints.

use crate::config::AppConfig;
use std::{
    env, fs,
    io::Write,
    panic,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
    time::{SystemTime, UNIX_EPOCH},
};

const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const CRASH_LOG_MAX_BYTES: u64 = 256 * 1024;
static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_SINK: OnceLock<Mutex<Option<RotatingFile>>> = OnceLock::new();

pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("asktty.log")
}

/// Crash lines carry location and version only, unless content logging is on.
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("asktty_crash.log")
}

/// Append-only file that starts over once it would pass `limit` bytes.
struct RotatingFile {
    path: PathBuf,
    file: fs::File,
    limit: u64,
    written: u64,
}

impl RotatingFile {
    fn open(path: PathBuf, limit: u64) -> Option<Self> {
        let mut written = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        if written > limit {
            let _ = fs::remove_file(&path);
            written = 0;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;
        Some(Self {
            path,
            file,
            limit,
            written,
        })
    }

    fn append(&mut self, line: &str) {
        if self.written.saturating_add(line.len() as u64) > self.limit {
            if let Ok(file) = truncate(&self.path) {
                self.file = file;
                self.written = 0;
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.written = self.written.saturating_add(line.len() as u64);
        }
    }
}

fn truncate(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

fn sink() -> &'static Mutex<Option<RotatingFile>> {
    LOG_SINK.get_or_init(|| Mutex::new(None))
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn set_enabled(enabled: bool, content: bool) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
    LOG_CONTENT_ENABLED.store(enabled && content, Ordering::Relaxed);
    let mut sink = sink().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *sink = if enabled {
        RotatingFile::open(log_file_path(), LOG_MAX_BYTES)
    } else {
        None
    };
}

/// Turn file logging on or off from the CLI flags.
pub fn init_logging(config: &AppConfig) {
    set_enabled(config.logging_enabled(), config.log_content);
}

pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let line = format!("[{}] {msg}\n", timestamp());
    let mut sink = sink().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(file) = sink.as_mut() {
        file.append(&line);
    }
}

/// Like `log_debug`, for lines that quote prompt or answer text.
pub fn log_debug_content(msg: &str) {
    if LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        log_debug(msg);
    }
}

pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    let payload = if LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        if let Some(text) = info.payload().downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = info.payload().downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        }
    } else {
        "payload omitted".to_string()
    };
    let line = format!(
        "[{}] panic at {location}: {payload} (asktty v{})\n",
        timestamp(),
        env!("CARGO_PKG_VERSION")
    );
    if let Some(mut crash) = RotatingFile::open(crash_log_path(), CRASH_LOG_MAX_BYTES) {
        crash.append(&line);
    }
}

#[cfg(test)]
pub(crate) fn set_logging_for_tests(enabled: bool, content_enabled: bool) {
    set_enabled(enabled, content_enabled);
}
