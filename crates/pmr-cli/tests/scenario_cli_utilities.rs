use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn pmr() -> Command {
    let mut cmd = Command::cargo_bin("pmr").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn normalize_prints_integer() {
    pmr()
        .args(["normalize", "1.2K"])
        .assert()
        .success()
        .stdout("1200\n");
    pmr()
        .args(["normalize", "n/a"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn config_hash_is_layer_order_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let local = dir.path().join("local.yaml");
    fs::write(&base, "reconcile:\n  fallback_threshold: 10\n").unwrap();
    fs::write(&local, "reconcile:\n  fallback_threshold: 25\n").unwrap();

    pmr()
        .arg("config-hash")
        .arg(&base)
        .arg(&local)
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains(r#"{"reconcile":{"fallback_threshold":25}}"#));
}

#[test]
fn config_with_secret_literal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("bad.yaml");
    fs::write(&cfg, "sources:\n  - kind: internal\n    cookie: 'li_at=AQEDAAAAAAAA'\n").unwrap();

    pmr()
        .args(["reconcile", "--config"])
        .arg(&cfg)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("AQEDAAAAAAAA").not());
}

#[test]
fn missing_required_argument_is_usage_error() {
    pmr().arg("reconcile").assert().code(1);
}

#[test]
fn audit_verify_reports_broken_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut w = pmr_audit::AuditWriter::new(&path, true).unwrap();
    let pass_id = uuid::Uuid::new_v4();
    for row in [5, 6, 7] {
        w.append(
            pass_id,
            pmr_audit::AuditEventType::Unmatched,
            serde_json::json!({ "row_index": row }),
        )
        .unwrap();
    }
    let tampered = fs::read_to_string(&path)
        .unwrap()
        .replace(r#""row_index":6"#, r#""row_index":60"#);
    fs::write(&path, tampered).unwrap();

    pmr()
        .args(["audit", "verify"])
        .arg(&path)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("audit_ok=false line=2"));
}
