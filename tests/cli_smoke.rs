use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn daybook(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("daybook").expect("binary");
    cmd.env_remove("DAYBOOK_PROFILE")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.join("missing.toml"))
        .arg("--store")
        .arg(dir.join("store.json"));
    cmd
}

#[test]
fn daybook_help_works() {
    Command::cargo_bin("daybook")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("date and profile partitioned task tracker"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "list", "add", "edit", "start", "pause", "resume", "toggle", "rm", "rollover", "sync",
        "profile", "shell",
    ];

    for cmd in subcommands {
        Command::cargo_bin("daybook")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn add_then_list_round_trips_through_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");

    daybook(dir.path())
        .args(["--date", "2026-10-16", "--json", "add", "Write report", "-p", "high"])
        .assert()
        .success()
        .stdout(contains("\"schema_version\": \"daybook.v1\""))
        .stdout(contains("\"title\": \"Write report\""));

    daybook(dir.path())
        .args(["--date", "2026-10-16", "list", "--no-sync"])
        .assert()
        .success()
        .stdout(contains("[todo] Write report (high)"));

    let raw = std::fs::read_to_string(dir.path().join("store.json")).expect("store written");
    assert!(raw.contains("tasks_2026-10-16"));
}

#[test]
fn profiles_partition_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");

    daybook(dir.path())
        .args(["profile", "create", "Work"])
        .assert()
        .success();
    daybook(dir.path())
        .args(["--profile", "Work", "--date", "2026-10-16", "add", "Standup"])
        .assert()
        .success();

    let raw = std::fs::read_to_string(dir.path().join("store.json")).expect("store written");
    assert!(raw.contains("tasks_Work_2026-10-16"));

    daybook(dir.path())
        .args(["--json", "profile", "list"])
        .assert()
        .success()
        .stdout(contains("\"Work\""));
}

#[test]
fn user_errors_exit_with_code_two() {
    let dir = tempfile::tempdir().expect("tempdir");

    daybook(dir.path())
        .args(["--profile", "Nope", "list", "--no-sync"])
        .assert()
        .code(2)
        .stderr(contains("Profile not found: Nope"));

    daybook(dir.path())
        .args(["profile", "create", "2026-01-01"])
        .assert()
        .code(2);

    daybook(dir.path())
        .args(["--date", "16/10/2026", "list", "--no-sync"])
        .assert()
        .code(2);

    daybook(dir.path())
        .args(["--json", "toggle", "missing"])
        .assert()
        .code(2)
        .stdout(contains("\"kind\": \"user_error\""));
}

#[test]
fn shell_supports_undo() {
    let dir = tempfile::tempdir().expect("tempdir");

    daybook(dir.path())
        .args(["--date", "2026-10-16", "shell"])
        .write_stdin("add First\nadd Second\nundo\nlist\nquit\n")
        .assert()
        .success()
        .stdout(contains("undone"))
        .stdout(contains("First"));

    daybook(dir.path())
        .args(["--date", "2026-10-16", "--json", "list", "--no-sync"])
        .assert()
        .success()
        .stdout(contains("First"))
        .stdout(contains("Second").not());
}
