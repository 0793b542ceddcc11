use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn projmark() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_projmark"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_report_json_summary_and_file() {
    let project = tempdir().unwrap();
    let out = tempdir().unwrap();
    let report_path = out.path().join("report.md");

    write_file(&project.path().join("a.py"), "print('hi')\n");
    write_file(&project.path().join("secret.env"), "TOKEN=abc\n");
    write_file(&project.path().join("node_modules/x.js"), "module.exports = 1\n");

    let output = projmark()
        .args([
            "report",
            project.path().to_str().unwrap(),
            "--output",
            report_path.to_str().unwrap(),
            "--encoding",
            "heuristic",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["files_included"], 1);
    assert_eq!(v["skipped_by_reason"]["sensitive_name_pattern"], 1);
    assert_eq!(v["output"], report_path.to_str().unwrap());

    let report = fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("File: a.py"));
    assert!(!report.contains("node_modules"));
    assert!(!report.contains("TOKEN=abc"));
}

#[test]
fn cli_report_stdout_respects_ignore_file() {
    let dir = tempdir().unwrap();

    write_file(&dir.path().join("keep.rs"), "fn keep() {}\n");
    write_file(&dir.path().join("ignored.rs"), "fn ignored() {}\n");
    write_file(&dir.path().join(".projmarkignore"), "ignored.rs\n");

    let output = projmark()
        .args(["report", dir.path().to_str().unwrap(), "--stdout", "--encoding", "heuristic"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("# Project Summary"));
    assert!(stdout.contains("File: keep.rs"));
    assert!(!stdout.contains("File: ignored.rs"));
    assert!(stdout.contains("### excluded_file"));

    let output = projmark()
        .args([
            "report",
            dir.path().to_str().unwrap(),
            "--stdout",
            "--encoding",
            "heuristic",
            "--no-ignore-file",
        ])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("File: ignored.rs"));
}

#[test]
fn cli_report_limits_and_exclusions() {
    let dir = tempdir().unwrap();

    for name in ["a.rs", "b.rs", "c.rs"] {
        write_file(&dir.path().join(name), "fn f() {}\n");
    }
    write_file(&dir.path().join("fixtures/data.rs"), "fn data() {}\n");

    let output = projmark()
        .args([
            "report",
            dir.path().to_str().unwrap(),
            "--stdout",
            "--encoding",
            "heuristic",
            "--max-files",
            "2",
            "--exclude-dirs",
            "fixtures",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("- Files included: 2\n"));
    assert!(stdout.contains("### file_count_budget_exhausted (1)"));
    assert!(stdout.contains("- c.rs\n"));
    assert!(!stdout.contains("fixtures"));
}

#[test]
fn cli_rejects_zero_limit() {
    let dir = tempdir().unwrap();
    let output = projmark()
        .args(["report", dir.path().to_str().unwrap(), "--stdout", "--max-lines", "0"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("max-lines must be a positive integer"));
}

#[test]
fn cli_missing_path_json_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");
    let report_path = dir.path().join("out.md");

    let output = projmark()
        .args([
            "report",
            missing.to_str().unwrap(),
            "--output",
            report_path.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert!(v["error"].as_str().unwrap().contains("path not found"));
    assert!(!report_path.exists());
}

#[test]
fn cli_tree_shows_structure_only() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("src/lib.rs"), "pub fn x() {}\n");
    write_file(&dir.path().join("src/deep/inner.rs"), "pub fn y() {}\n");

    let output = projmark()
        .args(["tree", dir.path().to_str().unwrap(), "--max-depth", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("src/"));
    assert!(stdout.contains("deep/ [not expanded]"));
    assert!(stdout.contains("lib.rs"));
    assert!(!stdout.contains("inner.rs"));
    assert!(!stdout.contains("File:"));
    assert!(stdout.ends_with("\n2 directories, 1 file\n"));

    let bare = projmark()
        .args(["tree", dir.path().to_str().unwrap(), "--no-metadata"])
        .output()
        .unwrap();
    let bare = String::from_utf8(bare.stdout).unwrap();
    assert!(bare.contains("inner.rs"));
    assert!(!bare.contains("directories"));
}

#[test]
fn cli_rules_json_includes_config_additions() {
    let dir = tempdir().unwrap();
    write_file(
        &dir.path().join(".projmark.toml"),
        "[rules]\nexclude_dirs = [\"generated\"]\n",
    );

    let output = projmark()
        .args(["rules", dir.path().to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let dirs: Vec<&str> = v["exclude_dirs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap())
        .collect();
    assert!(dirs.contains(&"generated"));
    assert!(dirs.contains(&"node_modules"));
}

#[test]
fn cli_completions() {
    let output = projmark().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("projmark"));
}
