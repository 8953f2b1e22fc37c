//! End-to-end tests for the `campus` binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

const TENANTS: &str = r#"[
    {"schema_name": "north", "name": "North Campus", "domain": "north.campus.test", "status": "active", "plan": "premium"},
    {"schema_name": "south", "name": "South Campus", "domain": "south.campus.test", "status": "trial"}
]"#;

fn campus(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("campus").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CAMPUS_DATABASE_URL")
        .env_remove("DATABASE_URL")
        .env_remove("CAMPUS_LOG_LEVEL")
        .env_remove("CAMPUS_DEBUG")
        .env("CAMPUS_STATE_FILE", dir.path().join("state.json"))
        .arg("--no-color");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

fn sync_tenants(dir: &TempDir) {
    let file = write(dir, "tenants.json", TENANTS);
    campus(dir)
        .args(["tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .success();
}

#[test]
fn test_tenant_sync_then_resync_unchanged() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", TENANTS);

    let first = json_stdout(
        campus(&dir)
            .args(["--json", "tenants", "sync", "--file"])
            .arg(&file),
    );
    assert_eq!(first["created"], 2);
    assert_eq!(first["tenants"].as_array().unwrap().len(), 2);

    let second = json_stdout(
        campus(&dir)
            .args(["--json", "tenants", "sync", "--file"])
            .arg(&file),
    );
    assert_eq!(second["created"], 0);
    assert_eq!(second["unchanged"], 2);
    assert_eq!(first["tenants"], second["tenants"]);
}

#[test]
fn test_tenant_sync_table_output() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", TENANTS);

    campus(&dir)
        .args(["tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("north"))
        .stdout(predicate::str::contains("2 created"));
}

#[test]
fn test_non_array_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", r#"{"schema_name": "north"}"#);

    campus(&dir)
        .args(["tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));

    assert!(!dir.path().join("state.json").exists());
}

#[test]
fn test_failed_entries_exit_nonzero() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "tenants.json",
        r#"[
            {"schema_name": "north", "name": "North", "domain": "north.campus.test", "status": "active"},
            {"schema_name": "pg_catalog", "name": "Bad", "domain": "bad.campus.test", "status": "active"},
            {"name": "No schema"}
        ]"#,
    );

    let output = campus(&dir)
        .args(["--json", "tenants", "sync", "--file"])
        .arg(&file)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["created"], 1);
    assert_eq!(report["failed"], 2);
}

#[test]
fn test_list_and_resolve() {
    let dir = TempDir::new().unwrap();
    sync_tenants(&dir);

    campus(&dir)
        .args(["tenants", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("south.campus.test"))
        .stdout(predicate::str::contains("2 tenant(s)"));

    campus(&dir)
        .args(["tenants", "resolve", "North.Campus.Test:8000"])
        .assert()
        .success()
        .stdout("north\n");

    campus(&dir)
        .args(["tenants", "resolve", "nowhere.campus.test"])
        .assert()
        .failure();
}

#[test]
fn test_migrate_reports_up_to_date() {
    let dir = TempDir::new().unwrap();
    sync_tenants(&dir);

    let report = json_stdout(campus(&dir).args(["--json", "tenants", "migrate"]));
    assert_eq!(report["up_to_date"], 2);
    assert_eq!(report["failed"], 0);
}

#[test]
fn test_orphans_empty() {
    let dir = TempDir::new().unwrap();
    sync_tenants(&dir);

    campus(&dir)
        .args(["tenants", "orphans"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No orphaned schemas"));
}

#[test]
fn test_users_create_and_update() {
    let dir = TempDir::new().unwrap();
    sync_tenants(&dir);

    let created = json_stdout(campus(&dir).args([
        "--json",
        "users",
        "create",
        "--schema",
        "north",
        "--email",
        "Head@North.edu",
        "--password",
        "north-pass-1",
        "--role",
        "super_admin",
    ]));
    assert_eq!(created["email"], "head@north.edu");
    assert_eq!(created["role"], "super_admin");
    assert_eq!(created["first_name"], "Super");
    assert!(created.get("password_hash").is_none());

    let updated = json_stdout(campus(&dir).args([
        "--json",
        "users",
        "create",
        "--schema",
        "north",
        "--email",
        "head@north.edu",
        "--password",
        "north-pass-1",
        "--role",
        "staff",
    ]));
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["role"], "staff");
}

#[test]
fn test_users_create_unknown_schema_fails() {
    let dir = TempDir::new().unwrap();
    sync_tenants(&dir);

    campus(&dir)
        .args([
            "users",
            "create",
            "--schema",
            "west",
            "--email",
            "a@west.edu",
            "--password",
            "west-pass-1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("west"));
}

#[test]
fn test_users_sync_reports_per_group() {
    let dir = TempDir::new().unwrap();
    sync_tenants(&dir);
    let file = write(
        &dir,
        "users.json",
        r#"[
            {"schema_name": "north", "users": [
                {"email": "t1@north.edu", "password": "teacher-pass", "role": "teacher"},
                {"email": "t2@north.edu", "password": "123"}
            ]},
            {"schema_name": "south", "users": [
                {"email": "admin@south.edu", "password": "south-admin-pass"}
            ]},
            {"schema_name": "west", "users": [
                {"email": "admin@west.edu", "password": "west-admin-pass"}
            ]}
        ]"#,
    );

    let output = campus(&dir)
        .args(["--json", "users", "sync", "--file"])
        .arg(&file)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let reports: Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0]["schema_name"], "north");
    assert_eq!(reports[0]["created"], 1);
    assert_eq!(reports[0]["failed"], 1);
    assert_eq!(reports[1]["created"], 1);
    assert_eq!(reports[2]["failed"], 1);
}

#[test]
fn test_state_file_flag_overrides_env() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", TENANTS);
    let custom = dir.path().join("nested").join("custom.json");

    campus(&dir)
        .arg("--state")
        .arg(&custom)
        .args(["tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .success();

    assert!(custom.exists());
    assert!(!Path::new(&dir.path().join("state.json")).exists());
}

#[test]
fn test_debug_env_enables_debug_logs() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", TENANTS);

    campus(&dir)
        .env("CAMPUS_DEBUG", "1")
        .args(["tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("Created schema 'north'"));
}

#[test]
fn test_default_run_logs_nothing_below_warn() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", TENANTS);

    campus(&dir)
        .args(["tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("Created schema").not());
}

#[test]
fn test_quiet_limits_logs_not_reports() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "tenants.json", TENANTS);

    campus(&dir)
        .env("CAMPUS_DEBUG", "1")
        .args(["-q", "tenants", "sync", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 created"))
        .stderr(predicate::str::contains("Created schema").not());

    campus(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Only log errors"));
}
