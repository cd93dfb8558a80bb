//! asktty entrypoint: resolve flags and settings, then hand the terminal to the
//! interactive session.

use anyhow::{Context, Result};
use asktty::app::Session;
use asktty::config::{AppConfig, FileSettingsStore, Settings};
use asktty::provider::{CompletionClient, OpenAiClient};
use asktty::telemetry::init_tracing;
use asktty::{init_logging, log_debug, log_file_path, ui};
use clap::Parser;
use std::sync::Arc;

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    config.validate()?;
    init_logging(&config);
    init_tracing(&config);
    log_debug("=== asktty started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let path = config.settings_path()?;
    let mut settings = Settings::load_from(&path)?;
    config.apply_overrides(&mut settings);

    if config.print_config {
        println!("settings file: {}", path.display());
        for line in settings.describe() {
            println!("{line}");
        }
        return Ok(());
    }

    let session = Session::new(
        settings,
        Box::new(|settings: &Settings| {
            let client = OpenAiClient::new(
                settings.api_key(),
                &settings.default_model,
                &settings.base_url,
            )?;
            Ok(Arc::new(client) as Arc<dyn CompletionClient>)
        }),
        Box::new(FileSettingsStore::new(path)),
    )
    .context("failed to create completion client")?;

    let result = ui::run_app(session);
    log_debug("=== asktty exiting ===");
    result
}
