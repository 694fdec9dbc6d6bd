//! CLI test cases.
//!
//! Most of these avoid the network entirely. The live scan test needs real
//! `OCR_API_KEY` and `OPENAI_API_KEY` credentials, and a receipt photo at
//! `tests/fixtures/receipt.jpg`.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

/// Well-formed structuring output for a carton of milk, bought twice.
static MILK_JSON: &str = r#"```json
{"items":[{"name":" Milk ","cost":"1,50","quantity":2,"sum":3}],
 "total_sum":3.0,"total_sum_no_taxes":null,"tax_20":null,"to_pay":null}
```"#;

/// Create a new `Command` with our binary, isolated from any `.env` file.
fn cmd(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("receipt-digitizer").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("OCR_API_KEY")
        .env_remove("OCR_PROJECT_ID")
        .env_remove("OCR_API_BASE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("OCR_API_KEY"));
}

#[test]
fn test_version() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir).arg("--version").assert().success();
}

#[test]
fn test_schema() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .args(["schema", "Receipt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("line_sum"))
        .stdout(predicate::str::contains("amount_due"));
    cmd(&dir)
        .args(["schema", "LineItem"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unit_cost"));
}

#[test]
fn test_prompt() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("prompt")
        .assert()
        .success()
        .stdout(predicate::str::contains("{{{ocr_text}}}"));
}

#[test]
fn test_validate_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("validate")
        .write_stdin(MILK_JSON)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "Milk""#))
        .stdout(predicate::str::contains(r#""line_sum": "3.00""#))
        .stdout(predicate::str::contains(r#""amount_due": "3.00""#))
        .stdout(predicate::str::contains("tax").not());
}

#[test]
fn test_validate_file_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.txt");
    let output = dir.path().join("receipt.json");
    fs::write(&input, MILK_JSON).unwrap();
    cmd(&dir)
        .arg("validate")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let receipt: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(receipt["total_sum"], "3.00");
    assert_eq!(receipt["items"][0]["quantity"], 2);
}

#[test]
fn test_validate_rejects_prose() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("validate")
        .write_stdin("I'm sorry, I can't read this receipt.")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_scan_requires_ocr_key() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .args(["scan", "receipt.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OCR_API_KEY"));
}

#[test]
fn test_scan_missing_image() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .env("OCR_API_KEY", "not-a-real-key")
        .args(["scan", "no-such-receipt.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no image was captured"));
}

#[test]
fn test_scan_rejects_bad_adjustment() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .args(["scan", "receipt.jpg", "--adjust", "first:+1"])
        .assert()
        .failure();
}

#[test]
#[ignore = "Needs OCR and OpenAI credentials"]
fn test_scan_live() {
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/receipt.jpg");
    Command::cargo_bin("receipt-digitizer")
        .unwrap()
        .arg("scan")
        .arg(fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("total_sum"));
}
