use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("iflow-forge"))
}

#[test]
fn build_writes_zip_and_iflw() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out/pkg.zip");
    let iflw = dir.path().join("flow.iflw");
    cli()
        .args(["build", "--input", "tests/fixtures/scenario_odata.json", "--out"])
        .arg(&out)
        .arg("--iflw-out")
        .arg(&iflw)
        .assert()
        .success()
        .stdout(predicate::str::contains("Create_Opportunity.iflw"))
        .stdout(predicate::str::contains("sha256:"));
    assert!(out.exists());
    let text = std::fs::read_to_string(&iflw).unwrap();
    assert!(text.starts_with("<?xml"));
}

#[test]
fn build_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pkg.zip");
    std::fs::write(&out, b"keep me").unwrap();
    cli()
        .args(["build", "--input", "tests/fixtures/scenario_odata.json", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(std::fs::read(&out).unwrap(), b"keep me");
}

#[test]
fn build_fails_on_dangling_reference() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pkg.zip");
    cli()
        .args(["build", "--input", "tests/fixtures/dangling_reference.json", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing_step"));
    assert!(!out.exists());
}

#[test]
fn repair_prints_fixed_document() {
    let assert = cli()
        .args(["repair", "--input", "tests/fixtures/sftp_hint.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("ADAPTER_REPAIRED"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let doc: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        doc["endpoints"][0]["components"][0]["receiver_adapter"]["type"],
        "sftp_adapter"
    );
}

#[test]
fn doctor_json_reports_pointer_and_code() {
    let assert = cli()
        .args(["doctor", "--json", "tests/fixtures/dangling_reference.json"])
        .assert()
        .failure();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let payload: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(payload["ok"], false);
    assert_eq!(payload["errors"][0]["code"], "DANGLING_REFERENCE");
}

#[test]
fn doctor_json_succeeds_on_a_valid_document() {
    let assert = cli()
        .args(["doctor", "--json", "tests/fixtures/duplicate_ids.json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let payload: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(payload["ok"], true);
    assert_eq!(payload["process_name"], "Duplicate Steps");
    assert_eq!(payload["diagnostics"][0]["code"], "DUPLICATE_COMPONENT_ID");
}

#[test]
fn doctor_walks_directories() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        "tests/fixtures/exclusive_branching.json",
        dir.path().join("a.json"),
    )
    .unwrap();
    std::fs::copy(
        "tests/fixtures/parallel_branching.json",
        dir.path().join("b.json"),
    )
    .unwrap();
    cli()
        .arg("doctor")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("All documents valid"));
}
