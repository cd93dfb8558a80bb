pub mod app;
pub mod buffer;
pub mod config;
pub mod context;
pub mod provider;
pub mod relay;
pub mod telemetry;
pub mod terminal_restore;
pub mod ui;

pub use app::{crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic};
