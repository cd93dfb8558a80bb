use std::fs;
use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn asktty_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_asktty").expect("asktty test binary not built")
}

fn asktty() -> Command {
    let mut command = Command::new(asktty_bin());
    command
        .env_remove("OPENAI_API_KEY")
        .env_remove("ASKTTY_CONFIG")
        .env_remove("ASKTTY_LOGS");
    command
}

#[test]
fn help_mentions_flags() {
    let output = asktty().arg("--help").output().expect("run asktty --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("asktty"));
    assert!(combined.contains("--print-config"));
    assert!(combined.contains("--model"));
}

#[test]
fn print_config_reports_defaults_for_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.json");
    let output = asktty()
        .args(["--print-config", "--config"])
        .arg(&path)
        .output()
        .expect("run asktty --print-config");
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("settings file: {}", path.display())));
    assert!(stdout.contains("api key: not set"));
    assert!(stdout.contains("model: gpt-4o-mini"));
    assert!(path.parent().is_some_and(|dir| dir.is_dir()));
    assert!(!path.exists());
}

#[test]
fn print_config_applies_cli_overrides_and_env_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"default_model":"gpt-4o","max_response_lines":12}"#).expect("write");
    let output = asktty()
        .env("OPENAI_API_KEY", "sk-from-env")
        .args(["--print-config", "--model", "o3-mini", "--config"])
        .arg(&path)
        .output()
        .expect("run asktty --print-config");
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("model: o3-mini"));
    assert!(stdout.contains("api key: set"));
    assert!(stdout.contains("max response lines: 12"));
    assert!(!stdout.contains("sk-from-env"));
}

#[test]
fn malformed_settings_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    fs::write(&path, "{not json").expect("write");
    let output = asktty()
        .args(["--print-config", "--config"])
        .arg(&path)
        .output()
        .expect("run asktty");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("failed to parse settings file"));
}

#[test]
fn invalid_base_url_is_rejected() {
    let output = asktty()
        .args(["--print-config", "--base-url", "ftp://example.com"])
        .output()
        .expect("run asktty");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--base-url must start with"));
}
