//! End-to-end CLI tests over temporary DRS trees.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const CONFIG: &str = "\
[default]
checksum = sha256sum | SHA256

[project:projx]
dataset_id = projx.%(institute)s.%(model)s.%(experiment)s.%(ensemble)s
directory_format = %(root)s/%(institute)s/%(model)s/%(experiment)s/%(ensemble)s/%(version)s
institute_options = NASA, NOAA
model_options = model1, model2, model3, model4, model5
experiment_options = rcp45, rcp85
";

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("gridmap.ini");
    std::fs::write(&path, CONFIG).unwrap();
    path
}

fn add_file(root: &Path, institute: &str, model: &str, experiment: &str, version: &str) {
    let dir = root
        .join(institute)
        .join(model)
        .join(experiment)
        .join("r1i1p1")
        .join(version);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("tas.nc"), b"climate data").unwrap();
}

fn gridmap() -> Command {
    Command::cargo_bin("gridmap").unwrap()
}

#[test]
fn map_writes_one_mapfile_per_dataset() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    add_file(&data, "NASA", "model1", "rcp45", "v20190101");
    add_file(&data, "NOAA", "model2", "rcp85", "v20190101");
    let config = write_config(tmp.path());

    gridmap()
        .args(["map", "--project", "projx", "--outdir"])
        .arg(&out)
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .success();

    let mapfile = out.join("projx.NASA.model1.rcp45.r1i1p1.v20190101.map");
    let content = std::fs::read_to_string(&mapfile).unwrap();
    assert_eq!(content.lines().count(), 1);
    let line = content.lines().next().unwrap();
    assert!(line.starts_with("projx.NASA.model1.rcp45.r1i1p1#20190101 | "));
    assert!(line.contains(" | 12 | mod_time="));
    assert!(line.contains(" | checksum_type=SHA256"));
}

#[test]
fn map_without_dataset_id_token_collapses_to_one_file() {
    // Scenario D: 5 distinct datasets, one shared output mapfile.
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    for model in ["model1", "model2", "model3", "model4", "model5"] {
        add_file(&data, "NASA", model, "rcp45", "v1");
    }
    let config = write_config(tmp.path());

    gridmap()
        .args(["map", "--project", "projx", "--mapfile", "everything", "--outdir"])
        .arg(&out)
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .success();

    let entries: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let content = std::fs::read_to_string(out.join("everything.map")).unwrap();
    assert_eq!(content.lines().count(), 5);
}

#[test]
fn map_skips_undeclared_values_and_exits_partial() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    add_file(&data, "NASA", "model1", "rcp45", "v1");
    add_file(&data, "ESA", "model1", "rcp45", "v1"); // undeclared institute
    let config = write_config(tmp.path());

    gridmap()
        .args(["map", "--project", "projx", "--outdir"])
        .arg(&out)
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("skipping file"));
}

#[test]
fn map_exits_failure_when_nothing_found() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    let config = write_config(tmp.path());

    gridmap()
        .args(["map", "--project", "projx"])
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .code(1);
}

#[test]
fn map_json_summary_reports_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    add_file(&data, "NASA", "model1", "rcp45", "v1");
    let config = write_config(tmp.path());

    let assert = gridmap()
        .args(["map", "--project", "projx", "--json", "--outdir"])
        .arg(&out)
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["mapped"], 1);
    assert_eq!(summary["skipped"], 0);
}

#[test]
fn audit_exits_failure_on_undeclared_values() {
    // Scenario C: experiments A,B declared; C observed on disk.
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    for exp in ["rcp45", "rcp85", "rcp26"] {
        let dir = data.join("NASA/model1").join(exp).join("r1i1p1/v1");
        std::fs::create_dir_all(dir).unwrap();
    }
    let config = write_config(tmp.path());

    gridmap()
        .args(["audit", "--project", "projx"])
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("undeclared value: rcp26"));
}

#[test]
fn audit_succeeds_on_consistent_vocabulary() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    let dir = data.join("NASA/model1/rcp45/r1i1p1/v1");
    std::fs::create_dir_all(dir).unwrap();
    let config = write_config(tmp.path());

    gridmap()
        .args(["audit", "--project", "projx"])
        .arg("-i")
        .arg(&config)
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("vocabulary is consistent"));
}

#[test]
fn unknown_project_is_a_fatal_error() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path());

    gridmap()
        .args(["map", "--project", "nope"])
        .arg("-i")
        .arg(&config)
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("project:nope"));
}
