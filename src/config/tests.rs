use super::*;
use clap::Parser;
use std::fs;

#[test]
fn defaults_parse_without_flags() {
    let mut cfg = AppConfig::parse_from(["asktty-tests"]);
    assert!(cfg.validate().is_ok());
    assert!(cfg.config_path.is_none());
    assert!(!cfg.print_config);
}

#[test]
fn rejects_empty_model_override() {
    let mut cfg = AppConfig::parse_from(["asktty-tests", "--model", "  "]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_base_url_without_scheme() {
    let mut cfg = AppConfig::parse_from(["asktty-tests", "--base-url", "localhost:11434"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn overrides_are_normalized_and_applied() {
    let mut cfg = AppConfig::parse_from([
        "asktty-tests",
        "--model",
        " llama3 ",
        "--base-url",
        "http://localhost:11434/v1/",
    ]);
    cfg.validate().unwrap();
    let mut settings = Settings::default();
    cfg.apply_overrides(&mut settings);
    assert_eq!(settings.default_model, "llama3");
    assert_eq!(settings.base_url, "http://localhost:11434/v1");
}

#[test]
fn no_logs_wins_over_logs() {
    let cfg = AppConfig::parse_from(["asktty-tests", "--logs", "--no-logs"]);
    assert!(!cfg.logging_enabled());
    let cfg = AppConfig::parse_from(["asktty-tests", "--logs"]);
    assert!(cfg.logging_enabled());
}

#[test]
fn config_flag_sets_settings_path() {
    let cfg = AppConfig::parse_from(["asktty-tests", "--config", "/tmp/asktty-test.json"]);
    assert_eq!(
        cfg.settings_path().unwrap(),
        std::path::PathBuf::from("/tmp/asktty-test.json")
    );
}

#[test]
fn missing_file_loads_defaults_and_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let settings = Settings::load_from(&path).unwrap();
    assert!(path.parent().unwrap().is_dir());
    assert_eq!(settings.default_model, DEFAULT_MODEL);
    assert_eq!(settings.max_compact_lines(), 8);
    assert_eq!(settings.position(), Position::Bottom);
}

#[test]
fn partial_file_keeps_defaults_for_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r##"{"default_model":"gpt-4o","position":"top","theme":{"accent_color":"#00FF00"}}"##,
    )
    .unwrap();
    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.default_model, "gpt-4o");
    assert_eq!(settings.position(), Position::Top);
    assert_eq!(settings.theme.accent_color, "#00FF00");
    assert_eq!(settings.theme.border_style, "rounded");
    assert!(settings.context.include_cwd);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{not json").unwrap();
    let err = Settings::load_from(&path).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse settings file"));
}

#[test]
fn env_key_overrides_active_provider() {
    let mut settings = Settings::default();
    settings.set_api_key("stored");
    settings.apply_env_key(Some("  ".into()));
    assert_eq!(settings.api_key(), "stored");
    settings.apply_env_key(Some("from-env".into()));
    assert_eq!(settings.api_key(), "from-env");
    settings.apply_env_key(None);
    assert_eq!(settings.api_key(), "from-env");
}

#[test]
fn file_store_round_trips_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("config.json");
    let store = FileSettingsStore::new(path.clone());
    let mut settings = Settings::default();
    settings.set_api_key("sk-test");
    settings.custom_instructions = "be terse".into();
    settings.max_response_lines = 12;
    store.save(&settings).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let decoded: Settings = serde_json::from_str(&raw).unwrap();
    assert_eq!(decoded, settings);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[cfg(unix)]
#[test]
fn file_store_tightens_existing_file_mode() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{}").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    let mut settings = Settings::default();
    settings.set_api_key("sk-test");
    FileSettingsStore::new(path.clone()).save(&settings).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn describe_redacts_the_key() {
    let mut settings = Settings::default();
    settings.set_api_key("sk-secret");
    let summary = settings.describe().join("\n");
    assert!(summary.contains("api key: set"));
    assert!(!summary.contains("sk-secret"));
    assert!(summary.contains("base url: (default)"));
}

#[test]
fn position_parsing_falls_back_to_bottom() {
    assert_eq!(Position::parse("TOP"), Position::Top);
    assert_eq!(Position::parse("middle"), Position::Bottom);
    assert_eq!(Position::parse(""), Position::Bottom);
}
