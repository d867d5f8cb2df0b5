use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn autonomy(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("autonomy").unwrap();
    cmd.current_dir(dir.path())
        .env("AUTONOMY_ROOT", dir.path())
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_OWNER")
        .env_remove("GITHUB_REPO");
    cmd
}

fn init_workspace(dir: &TempDir) {
    autonomy(dir).arg("init").assert().success();
}

// ---------------------------------------------------------------------------
// autonomy init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_state_tree() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir).arg("init").assert().success();

    assert!(dir.path().join(".autonomy").is_dir());
    assert!(dir.path().join(".autonomy/config.yaml").exists());
    assert!(dir.path().join(".autonomy/audit.log").exists());
    assert!(dir.path().join(".autonomy/pinned.json").exists());
    assert!(dir.path().join(".autonomy/field_cache.json").exists());
}

#[test]
fn init_is_idempotent_and_preserves_config() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    std::fs::write(
        dir.path().join(".autonomy/config.yaml"),
        "commit_window: 9\n",
    )
    .unwrap();
    autonomy(&dir).arg("init").assert().success();

    let config = std::fs::read_to_string(dir.path().join(".autonomy/config.yaml")).unwrap();
    assert!(config.contains("commit_window: 9"));
}

// ---------------------------------------------------------------------------
// autonomy pin / unpin
// ---------------------------------------------------------------------------

#[test]
fn pin_requires_initialized_workspace() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["pin", "7", "--owner", "octo", "--repo", "proj"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn pin_and_unpin_roundtrip() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    autonomy(&dir)
        .args(["pin", "7", "--owner", "octo", "--repo", "proj"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pinned #7"));

    let pinned = std::fs::read_to_string(dir.path().join(".autonomy/pinned.json")).unwrap();
    assert!(pinned.contains("octo/proj"));
    assert!(pinned.contains('7'));

    autonomy(&dir)
        .args(["unpin", "7", "--owner", "octo", "--repo", "proj"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unpinned #7"));

    autonomy(&dir)
        .args(["unpin", "7", "--owner", "octo", "--repo", "proj"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("was not pinned"));
}

#[test]
fn pin_json_output() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    autonomy(&dir)
        .args(["pin", "3", "--owner", "octo", "--repo", "proj", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pinned\": true"));
}

#[test]
fn pin_requires_owner_and_repo() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    autonomy(&dir)
        .args(["pin", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner"));
}

// ---------------------------------------------------------------------------
// autonomy next (network-backed commands need a token)
// ---------------------------------------------------------------------------

#[test]
fn next_without_token_fails_with_setup_error() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    autonomy(&dir)
        .args(["next", "--owner", "octo", "--repo", "proj"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("token"));
}

// ---------------------------------------------------------------------------
// autonomy audit
// ---------------------------------------------------------------------------

#[test]
fn audit_log_empty_workspace() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    autonomy(&dir)
        .args(["audit", "log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No audit entries."));
}

#[test]
fn audit_log_shows_recorded_entries() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    let logger =
        autonomy_core::audit::AuditLogger::new(dir.path().join(".autonomy/audit.log")).unwrap();
    let hash = logger
        .log(
            "update_labels",
            serde_json::json!({"issue": 2, "add_labels": ["a"], "remove_labels": null}),
        )
        .unwrap();

    autonomy(&dir)
        .args(["audit", "log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("update_labels"))
        .stdout(predicate::str::contains(hash));
}

#[test]
fn audit_stats_counts_mutations() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    let logger =
        autonomy_core::audit::AuditLogger::new(dir.path().join(".autonomy/audit.log")).unwrap();
    logger
        .log("update_state", serde_json::json!({"issue": 1, "state": "closed"}))
        .unwrap();

    autonomy(&dir)
        .args(["audit", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 mutations"));
}

#[test]
fn audit_requires_initialized_workspace() {
    let dir = TempDir::new().unwrap();
    autonomy(&dir)
        .args(["audit", "log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// autonomy board
// ---------------------------------------------------------------------------

#[test]
fn board_set_field_and_list() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);

    autonomy(&dir)
        .args(["board", "set-field", "Priority", "PVTF_123"])
        .assert()
        .success();

    autonomy(&dir)
        .args(["board", "fields"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PVTF_123"))
        .stdout(predicate::str::contains("missing:"))
        .stdout(predicate::str::contains("Sprint"));
}
