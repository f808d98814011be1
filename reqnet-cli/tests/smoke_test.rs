//! Smoke tests for the reqnet CLI
//!
//! These run the built binary against a temporary storage directory.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn reqnet(storage_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_reqnet"))
        .args(args)
        .env("REQNET_DIR", storage_dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("REQNET_CORE_LABEL")
        .env_remove("REQNET_PAUSED")
        .env_remove("REQNET_SIGNED_LIFETIME_SECS")
        .env_remove("REQNET_FEE_NUMERATOR")
        .env_remove("REQNET_FEE_DENOMINATOR")
        .env_remove("REQNET_FEE_MAX")
        .output()
        .expect("Failed to execute reqnet")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Test that the CLI can show help
#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = reqnet(temp_dir.path(), &["--help"]);

    assert!(output.status.success());
    let help = stdout(&output);
    for command in ["keygen", "sign", "inspect", "simulate"] {
        assert!(help.contains(command), "Help should mention '{command}'");
    }
}

#[test]
fn test_address_without_identity_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = reqnet(temp_dir.path(), &["address"]);
    assert!(!output.status.success());
}

#[test]
fn test_keygen_then_address() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = reqnet(temp_dir.path(), &["keygen"]);
    assert!(output.status.success());
    assert!(temp_dir.path().join("identity.json").exists());
    let created = stdout(&output);

    let output = reqnet(temp_dir.path(), &["address"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    let address_line = shown
        .lines()
        .find(|l| l.contains("0x"))
        .expect("address line");
    let address = address_line.split_whitespace().last().unwrap();
    assert!(created.contains(address));
}

#[cfg(unix)]
#[test]
fn test_keygen_restricts_identity_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(reqnet(temp_dir.path(), &["keygen"]).status.success());
    let mode = std::fs::metadata(temp_dir.path().join("identity.json"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);

    assert!(reqnet(temp_dir.path(), &["keygen", "--force"]).status.success());
    let mode = std::fs::metadata(temp_dir.path().join("identity.json"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_keygen_keeps_existing_identity() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(reqnet(temp_dir.path(), &["keygen"]).status.success());
    let before = std::fs::read_to_string(temp_dir.path().join("identity.json")).unwrap();

    assert!(reqnet(temp_dir.path(), &["keygen"]).status.success());
    let after = std::fs::read_to_string(temp_dir.path().join("identity.json")).unwrap();
    assert_eq!(before, after);

    assert!(reqnet(temp_dir.path(), &["keygen", "--force"]).status.success());
    let replaced = std::fs::read_to_string(temp_dir.path().join("identity.json")).unwrap();
    assert_ne!(before, replaced);
}

#[test]
fn test_sign_then_inspect() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(reqnet(temp_dir.path(), &["keygen"]).status.success());

    let sub_payee = format!("0x{}", "22".repeat(20));
    let output = reqnet(
        temp_dir.path(),
        &[
            "sign", "--amount", "1000", "250", "--sub-payee", &sub_payee, "--data", "invoice-42",
            "--raw",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let transport = stdout(&output).trim().to_string();
    assert!(transport.starts_with("reqnet:"));

    let output = reqnet(temp_dir.path(), &["inspect", &transport]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("invoice-42"));
    assert!(shown.contains(&sub_payee));
    assert!(shown.contains("Valid"));

    // Far past the default one-hour lifetime.
    let output = reqnet(temp_dir.path(), &["inspect", &transport, "--at", "99999999999"]);
    assert!(!output.status.success());
}

#[test]
fn test_sign_rejects_mismatched_amounts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(reqnet(temp_dir.path(), &["keygen"]).status.success());

    let output = reqnet(temp_dir.path(), &["sign", "--amount", "10", "20", "--raw"]);
    assert!(!output.status.success());
}

#[test]
fn test_inspect_rejects_garbage() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = reqnet(temp_dir.path(), &["inspect", "reqnet:not-base64!"]);
    assert!(!output.status.success());
}

#[test]
fn test_config_init_and_show() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = reqnet(temp_dir.path(), &["config", "init"]);
    assert!(output.status.success());
    assert!(temp_dir.path().join("reqnet.json").exists());

    let output = reqnet(temp_dir.path(), &["config", "show"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("core_label"));
    assert!(shown.contains("signed_lifetime_secs"));
}

#[test]
fn test_simulate_every_scenario() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for scenario in ["a", "b", "c", "d", "e", "f"] {
        let output = reqnet(temp_dir.path(), &["simulate", scenario]);
        assert!(
            output.status.success(),
            "scenario {scenario} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(stdout(&output).contains("completed"));
    }
}

#[test]
fn test_simulate_reports_scenario_c_amounts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = reqnet(temp_dir.path(), &["simulate", "c"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("expected 80 balance 0"));
    assert!(shown.contains("expected 15 balance 0"));
}

#[test]
fn test_simulate_escrow_release() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = reqnet(temp_dir.path(), &["simulate", "f"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("Held"));
    assert!(shown.contains("Rejected as expected"));
    assert!(shown.contains("expected 20 balance 20"));
}

#[test]
fn test_sign_escrow_then_inspect() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    assert!(reqnet(temp_dir.path(), &["keygen"]).status.success());

    let output = reqnet(
        temp_dir.path(),
        &["sign", "--amount", "500", "--extension", "escrow", "--raw"],
    );
    assert!(output.status.success());
    let transport = stdout(&output).trim().to_string();

    let output = reqnet(temp_dir.path(), &["inspect", &transport]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("Valid"));
    assert!(!shown.contains("unverified"));
}
