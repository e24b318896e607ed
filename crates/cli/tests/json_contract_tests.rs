// Integration tests enforcing the --json stdout contract.
//
// These tests guarantee that stdout from --json commands is:
//   1. Valid JSON
//   2. Exactly one JSON value (no banners, no log lines)
//   3. The correct shape for its command
//
// Run with: cargo test -p deltagrid-cli --test json_contract_tests -- --nocapture

use std::fs;
use std::process::Command;

fn dgrid() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dgrid"))
}

/// Assert stdout is a single, parseable JSON value.
fn assert_single_json(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed).unwrap_or_else(|e| {
        panic!("stdout must be valid JSON.\nParse error: {e}\nstdout:\n{trimmed}")
    })
}

// ===========================================================================
// dgrid align --json
// ===========================================================================

#[test]
fn align_json_reports_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("old.csv");
    let new = dir.path().join("new.csv");
    fs::write(&old, "id,status,note,status_new\n1,A,x,y\n").unwrap();
    fs::write(&new, "id,status,note\n1,A,x\n").unwrap();

    let output = dgrid()
        .args([
            "-vv",
            "align",
            old.to_str().unwrap(),
            new.to_str().unwrap(),
            "--key",
            "id",
            "--watch",
            "status",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["old_columns"], 4);
    assert_eq!(val["new_columns"], 3);

    let kinds: Vec<&str> = val["warnings"]
        .as_array()
        .expect("warnings must be an array")
        .iter()
        .map(|w| w["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["dimension", "column_overlap", "suffix_collision"]);
}

#[test]
fn align_with_dictionary() {
    let dir = tempfile::tempdir().unwrap();
    let dict = dir.path().join("dict.csv");
    let old = dir.path().join("old.csv");
    let new = dir.path().join("new.csv");
    fs::write(&dict, "column,role\nRadicado,PK\nEstado,\n").unwrap();
    fs::write(&old, "Radicado,Estado\n1,A\n").unwrap();
    fs::write(&new, "Radicado,Otro\n1,A\n").unwrap();

    let output = dgrid()
        .args([
            "align",
            old.to_str().unwrap(),
            new.to_str().unwrap(),
            "--dictionary",
            dict.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(output.stdout.is_empty(), "no JSON on failure");
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing column 'Estado'"));
}

#[test]
fn align_without_watch_is_usage_error() {
    let output = dgrid()
        .args(["align", "a.csv", "b.csv", "--key", "id"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ===========================================================================
// dgrid run --json
// ===========================================================================

#[test]
fn run_json_is_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("old.csv"), "id,status\n1,A\n2,B\n").unwrap();
    fs::write(dir.path().join("new.csv"), "id,status\n1,A\n2,C\n3,D\n").unwrap();
    fs::write(
        dir.path().join("recon.toml"),
        r#"
name = "contract"
key = "id"
watched = ["status"]
source_label = "test"

[inputs.old]
file = "old.csv"

[inputs.new]
file = "new.csv"
"#,
    )
    .unwrap();

    let output = dgrid()
        .current_dir(dir.path())
        .args(["-v", "run", "recon.toml", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    let obj = val.as_object().expect("summary must be an object");
    for field in [
        "name",
        "source_label",
        "old_rows",
        "new_rows",
        "new",
        "modified",
        "deleted",
        "unchanged",
        "merged_rows",
        "warnings",
        "engine_version",
        "run_at",
    ] {
        assert!(obj.contains_key(field), "summary must have '{field}'");
    }
    assert_eq!(val["source_label"], "test");
    assert_eq!(val["new"], 1);
    assert_eq!(val["modified"], 1);
    assert_eq!(val["unchanged"], 1);
}
