//! The `gavel` binary against an isolated home directory.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn gavel(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gavel"))
        .args(args)
        .env("HOME", home)
        .env("GAVEL_CONFIG", home.join("config.toml"))
        .env("GAVEL_DB_PATH", home.join("gavel.db"))
        .env_remove("GAVEL_TENANT")
        .env_remove("GAVEL_ACTOR")
        .env_remove("GAVEL_ENV")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn gavel_as(home: &Path, tenant: &str, args: &[&str]) -> Output {
    let mut full = vec!["--tenant", tenant];
    full.extend_from_slice(args);
    gavel(home, &full)
}

fn body(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[test]
fn init_writes_config_once() {
    let home = tempfile::tempdir().unwrap();

    let first = gavel(home.path(), &["init"]);
    assert!(first.status.success());
    assert_eq!(body(&first)["config_created"], true);
    assert!(home.path().join("config.toml").exists());
    assert!(home.path().join("gavel.db").exists());

    let second = gavel(home.path(), &["init"]);
    assert!(second.status.success());
    assert_eq!(body(&second)["config_created"], false);
}

#[test]
fn asset_commands_round_trip() {
    let home = tempfile::tempdir().unwrap();

    let created = gavel_as(home.path(), "t-cli", &["asset", "create", "--title", "Lot 9"]);
    assert!(created.status.success());
    let created = body(&created);
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["risk_level"], "LOW");

    let advanced = gavel_as(home.path(), "t-cli", &["asset", "transition", id, "F1"]);
    assert!(advanced.status.success());
    assert_eq!(body(&advanced)["to_stage"], "F1");

    let skipped = gavel_as(home.path(), "t-cli", &["asset", "transition", id, "F3"]);
    assert!(!skipped.status.success());
    let skipped = body(&skipped);
    assert_eq!(skipped["error"], "invalid_transition");
    assert_eq!(skipped["from"], "F1");

    let diligence = gavel_as(
        home.path(),
        "t-cli",
        &[
            "asset",
            "due-diligence",
            id,
            "--occupancy",
            "risk",
            "--debts",
            "risk",
            "--legal-risks",
            "risk",
        ],
    );
    assert!(diligence.status.success());
    assert_eq!(body(&diligence)["risk_score"], 90);

    let bid = gavel_as(home.path(), "t-cli", &["bid", "place", id, "1000"]);
    assert!(!bid.status.success());
    assert_eq!(body(&bid)["violations"][0], "VIOLATION_RISK_BLOCK_ACTIVE");

    let audit = gavel_as(home.path(), "t-cli", &["audit", "list", "auction_asset", id]);
    assert!(audit.status.success());
    assert!(!body(&audit).as_array().unwrap().is_empty());
}

#[test]
fn missing_tenant_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = gavel(home.path(), &["asset", "list"]);
    assert!(!output.status.success());
    assert_eq!(body(&output)["error"], "tenant_required");
}
