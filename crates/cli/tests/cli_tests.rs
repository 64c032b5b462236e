// End-to-end tests for the authorlink binary: exit codes, --json stdout shape,
// and snapshot write-back.
//
// Run with: cargo test -p authorlink-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn authorlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_authorlink"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("AUTHORLINK_TOKEN");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Copy the site snapshot somewhere writable.
fn scratch_snapshot(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("site.json");
    std::fs::copy(fixture("site.json"), &path).unwrap();
    path
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("authorlink should start")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| {
        panic!("stdout must be one JSON value: {e}\nstdout:\n{stdout}")
    })
}

fn read_snapshot(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

// ===========================================================================
// count / batch / run
// ===========================================================================

#[test]
fn count_json() {
    let output = run(authorlink()
        .args(["count", "--json", "-s"])
        .arg(fixture("site.json")));
    assert_exit(&output, 0);
    assert_eq!(stdout_json(&output)["count"], 7);
}

#[test]
fn batch_writes_snapshot_back() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);

    let output = run(authorlink()
        .args(["batch", "--limit", "3", "--json", "-s"])
        .arg(&snapshot));
    assert_exit(&output, 0);

    let report = stdout_json(&output);
    assert_eq!(report["processed"], 3);
    assert_eq!(report["remaining"], 4);
    assert_eq!(report["updated"], 2);
    assert_eq!(report["tally"]["no_identity"], 1);

    let after = read_snapshot(&snapshot);
    assert_eq!(after["term_meta"]["1"]["user_id"], "101");
    assert_eq!(after["term_meta"]["3"]["user_id"], "103");
    assert_eq!(after["term_meta"]["2"]["user_id"], "555");
}

#[test]
fn batch_dry_run_leaves_snapshot_alone() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);
    let before = std::fs::read_to_string(&snapshot).unwrap();

    let output = run(authorlink().args(["batch", "--dry-run", "-s"]).arg(&snapshot));
    assert_exit(&output, 0);
    assert_eq!(std::fs::read_to_string(&snapshot).unwrap(), before);
}

#[test]
fn run_pages_through_everything() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);

    let output = run(authorlink()
        .args(["run", "--limit", "3", "--json", "-s"])
        .arg(&snapshot));
    assert_exit(&output, 0);

    let summary = stdout_json(&output);
    assert_eq!(summary["pages"], 3);
    assert_eq!(summary["remaining"], 0);
    assert_eq!(summary["cancelled"], false);
    assert_eq!(summary["tally"]["updated"], 4);
    assert_eq!(summary["tally"]["no_identity"], 3);

    let after = read_snapshot(&snapshot);
    assert_eq!(after["term_meta"]["7"]["user_id"], "107");
}

#[test]
fn run_stops_after_max_pages() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);

    let output = run(authorlink()
        .args(["run", "--max-pages", "1", "--token", "s3cret", "--json", "-c"])
        .arg(fixture("token.toml"))
        .arg("-s")
        .arg(&snapshot));
    assert_exit(&output, 0);

    let summary = stdout_json(&output);
    assert_eq!(summary["pages"], 1);
    assert_eq!(summary["cancelled"], true);
    assert_eq!(summary["remaining"], 4);

    let after = read_snapshot(&snapshot);
    assert_eq!(after["term_meta"]["3"]["user_id"], "103");
    assert!(after["term_meta"]["5"].get("user_id").is_none());
}

// ===========================================================================
// gate
// ===========================================================================

#[test]
fn missing_token_is_rejected_before_reading_snapshot() {
    let output = run(authorlink()
        .args(["count", "-c"])
        .arg(fixture("token.toml"))
        .args(["-s", "does-not-exist.json"]));
    assert_exit(&output, 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Security check failed."));
}

#[test]
fn token_from_environment() {
    let output = run(authorlink()
        .env("AUTHORLINK_TOKEN", "s3cret")
        .args(["count", "-c"])
        .arg(fixture("token.toml"))
        .arg("-s")
        .arg(fixture("site.json")));
    assert_exit(&output, 0);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "7");
}

// ===========================================================================
// target / auto-map
// ===========================================================================

#[test]
fn target_by_username() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);

    let output = run(authorlink()
        .args(["target", "--by", "username", "GUEST3", "--json", "-s"])
        .arg(&snapshot));
    assert_exit(&output, 0);

    let report = stdout_json(&output);
    assert_eq!(report["user"]["id"], 103);
    assert_eq!(report["matched_authors"], 1);
    assert_eq!(report["tally"]["updated"], 1);
    assert_eq!(report["trace"].as_array().unwrap().len(), 7);
}

#[test]
fn target_without_authors_exits_11_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);
    let before = std::fs::read_to_string(&snapshot).unwrap();

    let output = run(authorlink()
        .args(["target", "--by", "email", "editor@example.com", "--force", "-s"])
        .arg(&snapshot));
    assert_exit(&output, 11);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No matching authors found for user \"Site Editor\"."));
    assert!(stderr.contains("guest1@example.com"));
    assert_eq!(std::fs::read_to_string(&snapshot).unwrap(), before);
}

#[test]
fn target_unknown_user_exits_10() {
    let output = run(authorlink()
        .args(["target", "--by", "display-name", "Nobody Here", "-s"])
        .arg(fixture("site.json")));
    assert_exit(&output, 10);
}

#[test]
fn target_blank_value_is_a_usage_error() {
    let output = run(authorlink()
        .args(["target", "--by", "email", "  ", "-s"])
        .arg(fixture("site.json")));
    assert_exit(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("No user specified."));
}

#[test]
fn auto_map_selected_authors() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = scratch_snapshot(&dir);

    let output = run(authorlink()
        .args(["auto-map", "--json", "-s"])
        .arg(&snapshot)
        .args(["1", "2", "4", "5"]));
    assert_exit(&output, 0);

    let result = stdout_json(&output);
    assert_eq!(result["selected"], 4);
    assert_eq!(result["mapped"], 2);

    let after = read_snapshot(&snapshot);
    assert_eq!(after["term_meta"]["2"]["user_id"], "555");
    assert_eq!(after["term_meta"]["5"]["user_id"], "105");
}

// ===========================================================================
// config
// ===========================================================================

#[test]
fn validate_config() {
    let output = run(authorlink().arg("validate-config").arg(fixture("token.toml")));
    assert_exit(&output, 0);

    let output = run(authorlink().arg("validate-config").arg(fixture("bad.toml")));
    assert_exit(&output, 21);
    assert!(String::from_utf8_lossy(&output.stderr).contains("batch.limit"));
}

#[test]
fn out_of_range_limit_is_a_usage_error() {
    let output = run(authorlink()
        .args(["batch", "--limit", "0", "-s"])
        .arg(fixture("site.json")));
    assert_exit(&output, 2);
}
