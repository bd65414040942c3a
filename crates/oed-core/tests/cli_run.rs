//! CLI end-to-end tests for `oed run`, `oed organs` and `oed schema`.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const INPUT: &str = r#"{
    "structures": [
        {
            "structName": "Lung",
            "dose": [0.0, 5.0, 10.0, 20.0, 30.0],
            "ratioToTotalVolume": [100.0, 80.0, 50.0, 20.0, 0.0]
        },
        {
            "structName": "Liver",
            "dose": [0.0, 2.0, 4.0, 8.0],
            "structureVolume": [1500.0, 1200.0, 600.0, 0.0],
            "volume": 1480.0
        },
        {
            "structName": "Couch",
            "dose": [0.0, 1.0],
            "ratioToTotalVolume": [1.0, 0.0]
        }
    ]
}"#;

fn oed() -> Command {
    let mut cmd = cargo_bin_cmd!("oed");
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("OED_TOLERANCE")
        .env_remove("OED_METHOD")
        .env_remove("OED_MODELS")
        .env_remove("OED_ORGAN_TABLE")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", "/nonexistent/oed-test-config");
    cmd
}

fn run_json(args: &[&str], input: &str) -> (Value, i32) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dvh.json");
    fs::write(&path, input).unwrap();
    let output = oed()
        .args(["--format", "json", "run", "--input"])
        .arg(&path)
        .args(args)
        .output()
        .unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).expect("parse JSON");
    (json, output.status.code().unwrap_or(-1))
}

#[test]
fn run_reports_known_organs() {
    let (json, code) = run_json(&[], INPUT);
    assert_eq!(code, 0);
    let organs = json["organs"].as_object().unwrap();
    assert_eq!(organs.len(), 2);
    for organ in ["Lung", "Liver"] {
        for model in ["lnt", "plateau_hall", "lin_exp", "competition"] {
            let result = &json["organs"][organ][model];
            assert!(result["dose"].is_number(), "{organ}/{model}");
            assert!(result["dose_uncertainty"].as_f64().unwrap() >= 0.0);
        }
    }
    assert!(json["organs"].get("Couch").is_none());
    assert_eq!(json["schema_version"], "1.0.0");
    assert_eq!(json["organ_table"], "embedded");
    assert!(json["generated_at"].is_string());
}

#[test]
fn run_honours_method_and_models() {
    let (json, code) = run_json(
        &["--method", "quadgk", "--models", "lnt,lin_exp", "--tolerance", "1e-4"],
        INPUT,
    );
    assert_eq!(code, 0);
    assert_eq!(json["settings"]["integration_method"], "quadgk");
    assert_eq!(json["settings"]["models"], serde_json::json!(["lnt", "lin_exp"]));
    assert!(json["organs"]["Lung"].get("plateau_hall").is_none());
}

#[test]
fn run_reads_settings_from_env() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dvh.json");
    fs::write(&path, INPUT).unwrap();
    let output = oed()
        .env("OED_METHOD", "trapz")
        .env("OED_MODELS", "competition")
        .args(["run", "--input"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["settings"]["integration_method"], "trapz");
    assert_eq!(json["settings"]["models"], serde_json::json!(["competition"]));
}

#[test]
fn skipped_organs_exit_one() {
    let input = r#"[
        {"structName": "Lung", "dose": [0, 10, 20], "ratioToTotalVolume": [1, 0.5, 0]},
        {"structName": "Bladder", "dose": [], "ratioToTotalVolume": []}
    ]"#;
    let (json, code) = run_json(&[], input);
    assert_eq!(code, 1);
    assert_eq!(json["skipped"][0]["organ"], "Bladder");
    assert_eq!(json["skipped"][0]["code"], 30);
    assert!(json["organs"]["Lung"].is_object());
}

#[test]
fn missing_input_file_exits_13() {
    oed()
        .args(["--format", "json", "run", "--input", "/nonexistent/dvh.json"])
        .assert()
        .code(13)
        .stdout(predicate::str::contains("\"code\":60"));
}

#[test]
fn unknown_method_exits_11() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dvh.json");
    fs::write(&path, INPUT).unwrap();
    oed()
        .args(["--format", "text", "run", "--method", "romberg", "--input"])
        .arg(&path)
        .assert()
        .code(11)
        .stderr(predicate::str::contains("romberg"));
}

#[test]
fn invalid_organ_table_exits_10() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("dvh.json");
    let table = dir.path().join("organs.json");
    fs::write(&input, INPUT).unwrap();
    fs::write(&table, r#"{"schema_version": "1.0.0", "organs": {}}"#).unwrap();
    oed()
        .args(["run", "--input"])
        .arg(&input)
        .arg("--organ-table")
        .arg(&table)
        .assert()
        .code(10);
}

#[test]
fn text_format_writes_table_to_output_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("dvh.json");
    let out = dir.path().join("report.txt");
    fs::write(&input, INPUT).unwrap();
    oed()
        .args(["--format", "text", "run", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("ORGAN"));
    assert!(text.contains("Liver"));
}

#[test]
fn organs_lists_embedded_table() {
    oed()
        .args(["--format", "text", "organs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lung").and(predicate::str::contains("Thyroid")));
}

#[test]
fn schema_describes_organ_table() {
    let output = oed().arg("schema").assert().success().get_output().stdout.clone();
    let json: Value = serde_json::from_slice(&output).unwrap();
    assert!(json["properties"]["organs"].is_object());
}
