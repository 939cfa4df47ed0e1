use assert_cmd::Command;
use predicates::prelude::*;
use ringcal::RingGridDetectReport;
use std::fs;
use std::path::Path;

fn ringcal() -> Command {
    Command::cargo_bin("ringcal").expect("ringcal binary")
}

fn write_config(dir: &Path, image: &str, report: &Path) -> std::path::PathBuf {
    let cfg = dir.join("detect.json");
    let json = serde_json::json!({
        "image_path": image,
        "board": { "rows": 3, "cols": 4, "spacing": 80.0, "radii": [10.0, 16.0, 24.0, 30.0] },
        "output_path": report,
    });
    fs::write(&cfg, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    cfg
}

#[test]
fn render_then_detect_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("board.png");

    ringcal()
        .args(["render", "--out"])
        .arg(&png)
        .assert()
        .success();
    assert!(png.exists());

    let report_path = dir.path().join("report.json");
    let cfg = write_config(dir.path(), "board.png", &report_path);
    ringcal()
        .args(["detect", "--config"])
        .arg(&cfg)
        .assert()
        .success();

    let report = RingGridDetectReport::load_json(&report_path).unwrap();
    assert!(report.error.is_none());
    assert_eq!(report.image_size, Some([361, 281]));
    let detection = report.detection.expect("detection");
    assert_eq!(detection.points.len(), 12);
    assert!((detection.points[0].x - 60.0).abs() < 0.1);
    assert!((detection.points[11].y - 220.0).abs() < 0.1);
}

#[test]
fn failed_detection_is_reported_and_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("blank.png");
    image::GrayImage::from_pixel(120, 90, image::Luma([128u8]))
        .save(&png)
        .unwrap();

    let report_path = dir.path().join("report.json");
    let cfg = write_config(dir.path(), "blank.png", &report_path);
    ringcal()
        .args(["detect", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("coarse ring grid not found"));

    let report = RingGridDetectReport::load_json(&report_path).unwrap();
    assert_eq!(report.error.as_deref(), Some("coarse ring grid not found"));
    assert!(report.detection.is_none());
}

#[test]
fn missing_image_is_reported_and_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");
    let cfg = write_config(dir.path(), "absent.png", &report_path);
    ringcal()
        .args(["detect", "--config"])
        .arg(&cfg)
        .assert()
        .failure();

    let report = RingGridDetectReport::load_json(&report_path).unwrap();
    assert!(report.error.is_some());
    assert!(report.image_size.is_none());
    assert!(report.detection.is_none());
}

#[test]
fn invalid_board_is_reported_and_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");
    let cfg = dir.path().join("detect.json");
    let json = serde_json::json!({
        "image_path": "board.png",
        "board": { "rows": 3, "cols": 4, "spacing": 50.0, "radii": [10.0, 16.0, 24.0, 30.0] },
        "output_path": report_path,
    });
    fs::write(&cfg, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    ringcal()
        .args(["detect", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not fit the node spacing"));

    let report = RingGridDetectReport::load_json(&report_path).unwrap();
    let error = report.error.expect("error recorded");
    assert!(error.contains("does not fit the node spacing"));
}

#[test]
fn render_rejects_overlapping_rings() {
    let dir = tempfile::tempdir().unwrap();
    ringcal()
        .args(["render", "--spacing", "50", "--out"])
        .arg(dir.path().join("bad.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not fit the node spacing"));
}

#[test]
fn missing_config_fails() {
    ringcal()
        .args(["detect", "--config", "/nonexistent/ringcal.json"])
        .assert()
        .failure();
}
