//! Integration tests: run the `.tsar` fixtures and drive the runner and CLI end to end.
//!
//! Usage:
//!   cargo test --test integration
//!   TSAR_VERBOSE=1 cargo test --test integration   # print every script log
//!   TSAR_WORK=1 cargo test --test integration      # keep work directories

use std::path::{Path, PathBuf};
use std::process::Command;
use tsar::{ErrorKind, State, TestRunnerBuilder};

fn testdata() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/testdata")
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn testdata_scripts() {
    tsar::run_and_assert(testdata());
}

#[test]
fn custom_command() {
    let src = tempfile::tempdir().unwrap();
    write(
        src.path(),
        "custom.tsar",
        "greet world\nexists greeting.txt\ngrep ^hello.world$ greeting.txt\n",
    );
    tsar::run_and_assert_with(src.path(), |engine| {
        engine
            .register_fn("greet", "write greeting.txt", |state: &mut State, _neg: bool, args: &[String]| {
                let path = state.mkabs("greeting.txt");
                std::fs::write(path, format!("hello {}\n", args.join(" ")))?;
                Ok(())
            })
            .unwrap();
    });
}

#[test]
fn work_directories_are_removed() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "a.tsar", "mkdir made\nenv\n");
    write(src.path(), "b.tsar", "env\nexists missing\n");

    let result = TestRunnerBuilder::new(src.path())
        .continue_on_error(true)
        .run()
        .unwrap();
    assert_eq!(result.cases.len(), 2);
    assert!(!result.all_passed());
    for case in &result.cases {
        assert!(case.workdir.is_none());
        let work = case
            .log
            .lines()
            .find_map(|l| l.strip_prefix("WORK="))
            .expect("env logs WORK");
        assert!(!Path::new(work).exists(), "{} was left behind", work);
    }
}

#[test]
fn workdir_root_keeps_directories() {
    let src = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    write(src.path(), "a.tsar", "mkdir made\n");

    let result = TestRunnerBuilder::new(src.path())
        .workdir_root(root.path())
        .run()
        .unwrap();
    let workdir = result.cases[0].workdir.clone().unwrap();
    assert!(workdir.starts_with(root.path()));
    assert!(workdir.join("made").is_dir());
}

#[test]
fn failure_on_first_line_still_finalizes() {
    let src = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    write(src.path(), "first.tsar", "! exists .\nmkdir never\n");

    let result = TestRunnerBuilder::new(src.path())
        .workdir_root(root.path())
        .run()
        .unwrap();
    let case = &result.cases[0];
    assert!(!case.passed);
    assert!(case.error.as_deref().unwrap().contains(":1: exists .: file"));
    assert!(case.log.contains("work directory:"));
    let workdir = case.workdir.clone().unwrap();
    assert!(!workdir.join("never").exists());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
}

#[test]
fn duplicate_names_rejected() {
    let src = tempfile::tempdir().unwrap();
    std::fs::create_dir(src.path().join("one")).unwrap();
    std::fs::create_dir(src.path().join("two")).unwrap();
    let files = vec![
        write(&src.path().join("one"), "same.tsar", "env A=1\n"),
        write(&src.path().join("two"), "same.tsar", "env A=1\n"),
    ];
    let err = TestRunnerBuilder::new(src.path())
        .files(files)
        .require_unique_names(true)
        .run()
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateName);
}

#[test]
fn short_mode_condition() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "short.tsar", "[short] stop\nexists missing\n");

    let long = TestRunnerBuilder::new(src.path()).run().unwrap();
    assert!(!long.all_passed());
    let short = TestRunnerBuilder::new(src.path()).short(true).run().unwrap();
    assert!(short.all_passed());
}

// ── CLI ──

fn tsar() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tsar"))
}

#[test]
fn cli_runs_directory() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "ok.tsar", "env A=1\n");
    let out = tsar().arg(src.path()).env_remove("RUST_LOG").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("PASS  ok"));
    assert!(stdout.contains("1 passed, 0 failed, 0 skipped"));
}

#[test]
fn cli_verbose_prints_passing_logs() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "ok.tsar", "env A=1\n");

    let quiet = tsar().arg(src.path()).env_remove("TSAR_VERBOSE").output().unwrap();
    assert!(!String::from_utf8_lossy(&quiet.stdout).contains("--- log ---"));

    let loud = tsar().arg("-v").arg(src.path()).output().unwrap();
    assert!(loud.status.success());
    let stdout = String::from_utf8_lossy(&loud.stdout);
    assert!(stdout.contains("--- log ---"));
    assert!(stdout.contains("> env A=1"));

    let from_env = tsar().arg(src.path()).env("TSAR_VERBOSE", "true").output().unwrap();
    assert!(String::from_utf8_lossy(&from_env.stdout).contains("> env A=1"));
}

#[test]
fn cli_reports_failure() {
    let src = tempfile::tempdir().unwrap();
    let file = write(src.path(), "bad.tsar", "exists missing\n");
    let out = tsar().arg(&file).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("FAIL  bad"));
}

#[test]
fn cli_rejects_bad_target() {
    let src = tempfile::tempdir().unwrap();
    let other = write(src.path(), "notes.txt", "exists missing\n");
    for target in [other, src.path().join("missing.tsar")] {
        let out = tsar().arg(&target).output().unwrap();
        assert_eq!(out.status.code(), Some(2));
        assert!(out.stdout.is_empty());
    }
}

#[test]
fn cli_list_commands() {
    let out = tsar().arg("--list-commands").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in ["exec", "wait", "stdout", "short", "linux"] {
        assert!(stdout.contains(name), "missing {}", name);
    }
}
