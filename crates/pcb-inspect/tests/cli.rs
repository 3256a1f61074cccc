mod common;

use assert_cmd::Command;
use common::*;
use pcb_inspect::{InspectionParams, InspectionReport, InspectionStage, JsonLinesLog, InspectionSink};
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("pcb-inspect").unwrap()
}

#[test]
fn default_config_is_valid_json() {
    let out = cli().arg("default-config").assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let params: InspectionParams = serde_json::from_str(&stdout).unwrap();
    assert_eq!(params.segment.diff_threshold, 50);
    assert_eq!(params.classify.border_margin, 10);
}

#[test]
fn inspect_writes_outputs_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let reference = blank_board();
    let ref_path = write_png(dir.path(), "ref.png", &reference);
    let test_path = write_png(dir.path(), "board.png", &with_square(&reference, 230, 230, 40, 0));
    let annotated = dir.path().join("annotated.png");
    let mask = dir.path().join("mask.png");
    let report = dir.path().join("report.json");
    let preview = dir.path().join("preview.png");
    let log = dir.path().join("history.jsonl");

    cli()
        .arg("inspect")
        .arg("--reference")
        .arg(&ref_path)
        .arg("--test")
        .arg(&test_path)
        .arg("--annotated")
        .arg(&annotated)
        .arg("--mask")
        .arg(&mask)
        .arg("--report")
        .arg(&report)
        .arg("--preview")
        .arg(&preview)
        .arg("--log")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 defect(s) -> FAIL"))
        .stdout(predicate::str::contains("short"));

    assert!(annotated.exists());
    assert!(mask.exists());
    let preview_img = pcb_inspect::load_image(&preview).unwrap();
    assert_eq!(preview_img.width(), 600);

    let report = InspectionReport::load_json(&report).unwrap();
    assert_eq!(report.stage, InspectionStage::Done);
    assert_eq!(report.defect_count, 1);

    let records = JsonLinesLog::new(&log).records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "board.png");
}

#[test]
fn missing_image_fails_with_report() {
    let dir = tempfile::tempdir().unwrap();
    let ref_path = write_png(dir.path(), "ref.png", &blank_board());
    let report = dir.path().join("report.json");

    cli()
        .arg("inspect")
        .arg("--reference")
        .arg(&ref_path)
        .arg("--test")
        .arg(dir.path().join("missing.png"))
        .arg("--report")
        .arg(&report)
        .assert()
        .failure()
        .stderr(predicate::str::contains("image not found"));

    let report = InspectionReport::load_json(&report).unwrap();
    assert_eq!(report.stage, InspectionStage::Failed);
    assert_eq!(report.failed_stage, Some(InspectionStage::Loading));
}

#[test]
fn batch_then_history_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let reference = blank_board();
    let ref_path = write_png(dir.path(), "ref.png", &reference);
    let good = write_png(dir.path(), "good.png", &reference);
    let bad = write_png(dir.path(), "bad.png", &with_square(&reference, 300, 120, 10, 255));
    let out_dir = dir.path().join("out");
    let log = dir.path().join("history.jsonl");

    cli()
        .arg("batch")
        .arg("--reference")
        .arg(&ref_path)
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--log")
        .arg(&log)
        .arg(&good)
        .arg(&bad)
        .assert()
        .success();

    assert!(out_dir.join("good_annotated.png").exists());
    assert!(out_dir.join("bad_report.json").exists());

    cli()
        .args(["history", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("good.png"))
        .stdout(predicate::str::contains("PASS"))
        .stdout(predicate::str::contains("FAIL"));

    cli()
        .args(["summary", "--json", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pass_rate_percent\": 50"));
}
