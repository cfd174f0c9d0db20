//! E2E CLI tests covering:
//! - `ir init` and the uninitialized-directory error
//! - obligee registration and inforequest creation
//! - branch inspection, expiration sweeps, appeals, and advancements
//! - error codes for refused actions in human and JSON mode
//!
//! Each test runs the `ir` binary as a subprocess against a fresh data
//! directory. Backdated requests (2010) are long overdue under the real
//! clock; requests dated today are not.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the `ir` binary with `dir` as data directory.
fn ir_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ir"));
    cmd.arg("--data-dir").arg(dir);
    cmd.env("IR_LOG", "error");
    cmd.env_remove("IR_HOME");
    cmd
}

fn init(dir: &Path) {
    ir_cmd(dir).arg("init").assert().success();
}

/// Run a command with `--json` and parse stdout.
fn json_ok(dir: &Path, args: &[&str]) -> Value {
    let output = ir_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Run a command expected to fail with `--json` and parse the stderr error.
fn json_err(dir: &Path, args: &[&str]) -> Value {
    let output = ir_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(!output.status.success(), "{args:?} unexpectedly succeeded");
    let value: Value =
        serde_json::from_slice(&output.stderr).expect("errors should be JSON in --json mode");
    value["error"].clone()
}

fn add_obligee(dir: &Path, name: &str, email: &str) -> i64 {
    let json = json_ok(dir, &["obligee", "add", name, "--email", email]);
    json["obligee_id"].as_i64().expect("obligee_id field")
}

/// Create an inforequest, returning `(inforequest_id, branch_id)`.
fn create_inforequest(dir: &Path, obligee_id: i64, date: Option<&str>) -> (i64, i64) {
    let obligee = obligee_id.to_string();
    let mut args = vec![
        "inforequest",
        "create",
        "--applicant",
        "Jane Doe",
        "--obligee",
        &obligee,
        "--subject",
        "Budget",
    ];
    if let Some(date) = date {
        args.extend(["--date", date]);
    }
    let json = json_ok(dir, &args);
    (
        json["inforequest_id"].as_i64().expect("inforequest_id"),
        json["branch_id"].as_i64().expect("branch_id"),
    )
}

fn capabilities(branch: &Value) -> Vec<String> {
    branch["capabilities"]
        .as_array()
        .expect("capabilities array")
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect()
}

fn action_types(branch: &Value) -> Vec<String> {
    branch["actions"]
        .as_array()
        .expect("actions array")
        .iter()
        .filter_map(|a| a["action_type"].as_str().map(str::to_string))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_database_and_config() {
    let dir = TempDir::new().expect("tempdir");
    let json = json_ok(dir.path(), &["init"]);
    assert_eq!(json["schema_version"], 2);
    assert!(dir.path().join("inforequests.sqlite3").exists());
    assert!(dir.path().join("config.toml").exists());

    ir_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
    ir_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn uninitialized_directory_reports_e1001() {
    let dir = TempDir::new().expect("tempdir");
    ir_cmd(dir.path())
        .args(["obligee", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"))
        .stderr(predicate::str::contains("ir init"));

    let error = json_err(dir.path(), &["expire"]);
    assert_eq!(error["code"], "E1001");
}

#[test]
fn overdue_request_is_expired_once_and_then_appealable() {
    let dir = TempDir::new().expect("tempdir");
    init(dir.path());
    let obligee = add_obligee(dir.path(), "Town Hall", "Town Hall <hall@town.example>");
    let (_, branch) = create_inforequest(dir.path(), obligee, Some("2010-07-05"));
    let branch_arg = branch.to_string();

    let shown = json_ok(dir.path(), &["branch", "show", &branch_arg]);
    assert_eq!(action_types(&shown), vec!["request"]);
    assert!(capabilities(&shown).contains(&"appeal".to_string()));
    assert_eq!(shown["obligee_name"], "Town Hall");
    assert_eq!(shown["emails"][0]["address"], "hall@town.example");
    assert_eq!(shown["actions"][0]["deadline_date"], "2010-07-20");

    let error = json_err(
        dir.path(),
        &["action", "add", &branch_arg, "--type", "expiration"],
    );
    assert_eq!(error["code"], "E4001");

    let first = json_ok(dir.path(), &["expire"]);
    assert_eq!(first["checked"], 1);
    assert_eq!(first["expirations"], 1);
    assert_eq!(first["failed"], 0);

    let second = json_ok(dir.path(), &["expire"]);
    assert_eq!(second["expirations"], 0);

    let appeal = json_ok(
        dir.path(),
        &["action", "add", &branch_arg, "--type", "appeal"],
    );
    assert_eq!(appeal["action_type"], "appeal");
    assert_eq!(appeal["position"], 3);

    let shown = json_ok(dir.path(), &["branch", "show", &branch_arg]);
    assert_eq!(
        action_types(&shown),
        vec!["request", "expiration", "appeal"]
    );
    assert!(capabilities(&shown).contains(&"affirmation".to_string()));
}

#[test]
fn advancement_spawns_branches_for_each_target() {
    let dir = TempDir::new().expect("tempdir");
    init(dir.path());
    let hall = add_obligee(dir.path(), "Town Hall", "hall@town.example");
    let ministry = add_obligee(dir.path(), "Ministry", "desk@ministry.example");
    let (inforequest, branch) = create_inforequest(dir.path(), hall, None);

    let advanced = json_ok(
        dir.path(),
        &["advance", &branch.to_string(), "--to", &ministry.to_string()],
    );
    assert_eq!(advanced["action"]["action_type"], "advancement");
    let children = advanced["branches"].as_array().expect("branches array");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["obligee_id"], ministry);

    let child = children[0]["branch_id"].as_i64().expect("branch_id");
    let shown = json_ok(dir.path(), &["branch", "show", &child.to_string()]);
    assert_eq!(action_types(&shown), vec!["advanced_request"]);
    assert_eq!(shown["main"], false);

    let detail = json_ok(dir.path(), &["inforequest", "show", &inforequest.to_string()]);
    let branches = detail["branches"].as_array().expect("branches array");
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0]["last_action"]["action_type"], "advancement");
    assert_eq!(branches[1]["last_action"]["action_type"], "advanced_request");
}

#[test]
fn advancement_through_action_add_needs_a_target() {
    let dir = TempDir::new().expect("tempdir");
    init(dir.path());
    let hall = add_obligee(dir.path(), "Town Hall", "hall@town.example");
    let (_, branch) = create_inforequest(dir.path(), hall, None);

    let error = json_err(
        dir.path(),
        &["action", "add", &branch.to_string(), "--type", "advancement"],
    );
    assert_eq!(error["code"], "E3001");
}

#[test]
fn refused_actions_report_their_codes() {
    let dir = TempDir::new().expect("tempdir");
    init(dir.path());
    let hall = add_obligee(dir.path(), "Town Hall", "hall@town.example");
    let (_, branch) = create_inforequest(dir.path(), hall, None);
    let branch_arg = branch.to_string();

    let error = json_err(
        dir.path(),
        &["action", "add", &branch_arg, "--type", "disclosure"],
    );
    assert_eq!(error["code"], "E4004");

    let error = json_err(dir.path(), &["action", "add", &branch_arg, "--type", "verdict"]);
    assert_eq!(error["code"], "E4005");

    let error = json_err(
        dir.path(),
        &["action", "add", &branch_arg, "--type", "affirmation"],
    );
    assert_eq!(error["code"], "E4002");

    let error = json_err(
        dir.path(),
        &["action", "add", &branch_arg, "--type", "confirmation", "--date", "2000-01-01"],
    );
    assert_eq!(error["code"], "E4003");

    ir_cmd(dir.path())
        .args(["action", "add", &branch_arg, "--type", "disclosure"])
        .args(["--disclosure-level", "full"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disclosure"));

    ir_cmd(dir.path())
        .args(["branch", "show", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2003]: branch 999 not found"));
}

#[test]
fn obligee_update_keeps_existing_branches_on_their_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    init(dir.path());
    let hall = add_obligee(dir.path(), "Town Hall", "hall@town.example");
    let (_, branch) = create_inforequest(dir.path(), hall, None);

    let updated = json_ok(
        dir.path(),
        &["obligee", "update", &hall.to_string(), "--name", "City Hall"],
    );
    assert_eq!(updated["name"], "City Hall");

    let shown = json_ok(dir.path(), &["branch", "show", &branch.to_string()]);
    assert_eq!(shown["obligee_name"], "Town Hall");

    let detail = json_ok(dir.path(), &["obligee", "show", &hall.to_string()]);
    assert_eq!(detail["snapshots"].as_array().map(Vec::len), Some(2));
}
