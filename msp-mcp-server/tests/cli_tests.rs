use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::io::Write;
use std::process::{Command as StdCommand, Stdio};
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 6] = [
    "RMM_CLIENT_ID",
    "RMM_CLIENT_SECRET",
    "PSA_CLIENT_ID",
    "PSA_CLIENT_SECRET",
    "REPORTING_CLIENT_ID",
    "REPORTING_CLIENT_SECRET",
];

fn server_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("msp-mcp-server").unwrap();
    cmd.current_dir(dir.path());
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// `--init` writes a starter configuration
#[test]
fn test_config_initialization() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("msp.json");

    server_cmd(&dir)
        .arg("--init")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("created successfully"))
        .stdout(predicate::str::contains("RMM_CLIENT_ID"));

    let config: Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    let vendors = config.get("vendors").unwrap();
    assert!(vendors.get("rmm").is_some());
    assert!(vendors.get("psa").is_some());
    assert!(vendors.get("reporting").is_some());
    assert_eq!(vendors["rmm"]["schema"]["type"], "remote");
    assert_eq!(config["http"]["timeout_secs"], 30);
    assert!(config.get("cache").is_some());
    assert!(config.get("logging").is_some());
}

/// `--init` without a path writes config.json in the working directory
#[test]
fn test_config_initialization_default_path() {
    let dir = TempDir::new().unwrap();
    server_cmd(&dir).arg("--init").assert().success();
    assert!(dir.path().join("config.json").exists());
}

/// `--init` refuses to overwrite
#[test]
fn test_config_initialization_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, "{}").unwrap();

    server_cmd(&dir)
        .arg("--init")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "{}");
}

#[test]
fn test_invalid_arguments() {
    let dir = TempDir::new().unwrap();
    server_cmd(&dir).arg("--invalid-flag").assert().failure();
}

#[test]
fn test_server_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, "{ invalid json }").unwrap();

    server_cmd(&dir)
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error loading configuration"));
}

#[test]
fn test_server_missing_config() {
    let dir = TempDir::new().unwrap();
    server_cmd(&dir)
        .arg("/nonexistent/config.json")
        .assert()
        .failure();
    server_cmd(&dir).assert().failure();
}

/// Startup aborts when a vendor has no credentials
#[test]
fn test_missing_credentials_abort_startup() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    server_cmd(&dir).arg("--init").arg(&config_path).assert().success();

    server_cmd(&dir)
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("RMM_CLIENT_SECRET"));
}

/// Credentials from `.env` are picked up
#[test]
fn test_dotenv_supplies_credentials() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    server_cmd(&dir).arg("--init").arg(&config_path).assert().success();

    let mut env_file = std::fs::File::create(dir.path().join(".env")).unwrap();
    for var in CREDENTIAL_VARS {
        writeln!(env_file, "{var}=from-dotenv").unwrap();
    }
    drop(env_file);

    // Valid configuration; stdin closes immediately so the server exits cleanly
    server_cmd(&dir)
        .arg(&config_path)
        .write_stdin("")
        .assert()
        .stderr(predicate::str::contains("client_id is missing").not());
}

/// Server starts and waits on stdio once configured
#[test]
fn test_server_startup_shutdown() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    server_cmd(&dir).arg("--init").arg(&config_path).assert().success();

    let mut command = StdCommand::new(env!("CARGO_BIN_EXE_msp-mcp-server"));
    command
        .arg(&config_path)
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for var in CREDENTIAL_VARS {
        command.env(var, "test-value");
    }
    let mut server_process = command.spawn().expect("Failed to start server");

    std::thread::sleep(std::time::Duration::from_millis(500));
    assert!(
        server_process.try_wait().unwrap().is_none(),
        "Server should still be running"
    );

    server_process.kill().expect("Failed to kill server");
    server_process.wait().expect("Failed to wait for server");
}
