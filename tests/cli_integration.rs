use assert_cmd::Command;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write an executable fake host-runner script into `dir`.
///
/// Protocol:
/// - `--collect-only -q`: print the test ids from `$FAKE_TESTS_FILE`
/// - coverage mode (`GREMLINS_COVERAGE_FILE` set): copy `$FAKE_COVERAGE_FILE`
///   into place
/// - filtered run: log a `RUN` line to `$FAKE_CALL_LOG`, then consult
///   `$FAKE_ZAP_FILE` (`<gremlin-id> <test-id>` lines; `HANG` sleeps) to
///   decide between pass, fail, and hang
#[cfg(unix)]
fn make_fake_runner(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let runner_path = dir.join("fake-runner");
    let script = r#"#!/usr/bin/env bash
set -euo pipefail

if [[ "${1-}" == "--collect-only" ]]; then
  cat "$FAKE_TESTS_FILE"
  exit 0
fi

if [[ -n "${GREMLINS_COVERAGE_FILE-}" ]]; then
  cp "$FAKE_COVERAGE_FILE" "$GREMLINS_COVERAGE_FILE"
  exit 0
fi

if [[ -n "${FAKE_CALL_LOG-}" ]]; then
  echo "RUN ${ACTIVE_GREMLIN-} $*" >> "$FAKE_CALL_LOG"
fi

if [[ -n "${FAKE_ZAP_FILE-}" && -n "${ACTIVE_GREMLIN-}" ]]; then
  while read -r gid test; do
    if [[ "$gid" == "$ACTIVE_GREMLIN" ]]; then
      if [[ "$test" == "HANG" ]]; then
        sleep 30
        exit 0
      fi
      echo "FAILED $test"
      exit 1
    fi
  done < "$FAKE_ZAP_FILE"
fi

exit 0
"#;

    fs::write(&runner_path, script).expect("write fake runner");
    let mut perms = fs::metadata(&runner_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&runner_path, perms).unwrap();
    runner_path
}

fn normalize_output(text: &str) -> String {
    // Redact JSON duration fields to stabilize snapshots.
    let re_ms = Regex::new(r#""execution_time_ms"\s*:\s*[0-9.eE+-]+"#).unwrap();
    let out = re_ms.replace_all(text, r#""execution_time_ms": 0"#);

    // Redact textual durations like `261ms` or `1.5s`.
    let re_dur = Regex::new(r"\b\d+(\.\d+)?(ns|us|ms|s)\b").unwrap();
    let out = re_dur.replace_all(&out, "<DUR>");

    // Redact tmp paths if they ever leak into output.
    let re_tmp = Regex::new(r#"/tmp/[^\s"]+"#).unwrap();
    let out = re_tmp.replace_all(&out, "<TMP>");

    out.to_string()
}

/// Support files for a run against the committed adult fixture.
#[cfg(unix)]
struct FakeEnv {
    _dir: TempDir,
    runner: PathBuf,
    tests_file: PathBuf,
    coverage_file: PathBuf,
    call_log: PathBuf,
    zap_file: PathBuf,
    cache_dir: PathBuf,
    out_dir: PathBuf,
}

#[cfg(unix)]
fn adult_fake_env() -> FakeEnv {
    let dir = TempDir::new().expect("TempDir should create");
    let runner = make_fake_runner(dir.path());

    let tests_file = dir.path().join("tests.txt");
    fs::write(&tests_file, "tests/test_adult.py::test_is_adult_true\n").unwrap();

    let coverage_file = dir.path().join("coverage-fixture.json");
    fs::write(
        &coverage_file,
        r#"{"tests":{"tests/test_adult.py::test_is_adult_true":{"src/adult.py":[1,2]}}}"#,
    )
    .unwrap();

    let call_log = dir.path().join("calls.log");
    let zap_file = dir.path().join("zap.txt");
    // The suite asserts only is_adult(25): `>= to <` and `18 to 19` fail it.
    fs::write(
        &zap_file,
        "g002 tests/test_adult.py::test_is_adult_true\ng004 tests/test_adult.py::test_is_adult_true\n",
    )
    .unwrap();

    let cache_dir = dir.path().join("cache");
    let out_dir = dir.path().join("out");

    FakeEnv {
        _dir: dir,
        runner,
        tests_file,
        coverage_file,
        call_log,
        zap_file,
        cache_dir,
        out_dir,
    }
}

#[cfg(unix)]
fn gremlins_run_cmd(env: &FakeEnv) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gremlins"));
    cmd.args([
        "run",
        "--project",
        "tests/fixtures/adult_project",
        "--operators",
        "comparison,boundary",
        "--sequential",
        "--no-warmup",
        "--runner",
        env.runner.to_str().unwrap(),
        "--cache-dir",
        env.cache_dir.to_str().unwrap(),
        "--out-dir",
        env.out_dir.to_str().unwrap(),
    ])
    .env("NO_COLOR", "1")
    .env("RUST_BACKTRACE", "0")
    .env("RUST_LOG", "error")
    .env("FAKE_TESTS_FILE", &env.tests_file)
    .env("FAKE_COVERAGE_FILE", &env.coverage_file)
    .env("FAKE_CALL_LOG", &env.call_log)
    .env("FAKE_ZAP_FILE", &env.zap_file);
    cmd
}

#[test]
fn scan_fixture_snapshot() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gremlins"));
    cmd.args(["scan", "--project", "tests/fixtures/adult_project"])
        .env("NO_COLOR", "1")
        .env("RUST_BACKTRACE", "0")
        .env("RUST_LOG", "error");

    let output = cmd.output().expect("command should run");
    let combined = format!(
        "status: {}\n--- stdout ---\n{}--- stderr ---\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    insta::assert_snapshot!("scan_fixture", normalize_output(&combined));
}

#[test]
fn help_names_every_subcommand() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gremlins"));
    cmd.arg("--help").env("NO_COLOR", "1");
    let output = cmd.output().expect("command should run");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();

    assert!(output.status.success());
    for needle in ["scan", "run", "clear-cache", "mutation testing"] {
        assert!(stdout.contains(needle), "--help missing {needle:?}");
    }
}

#[cfg(unix)]
#[test]
fn run_adult_json_snapshot() {
    let env = adult_fake_env();
    let mut cmd = gremlins_run_cmd(&env);
    cmd.arg("--json");

    let output = cmd.output().expect("command should run");
    assert!(output.status.success(), "run failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    insta::assert_snapshot!("run_adult_json", normalize_output(&stdout));
}

#[cfg(unix)]
#[test]
fn run_below_min_score_exits_2() {
    let env = adult_fake_env();
    let mut cmd = gremlins_run_cmd(&env);
    cmd.args(["--min-score", "90"]);

    let output = cmd.output().expect("command should run");
    assert_eq!(output.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn run_at_or_above_min_score_exits_0() {
    let env = adult_fake_env();
    let mut cmd = gremlins_run_cmd(&env);
    cmd.args(["--min-score", "50"]);

    let output = cmd.output().expect("command should run");
    assert_eq!(output.status.code(), Some(0));
}

#[cfg(unix)]
#[test]
fn run_console_report_names_survivors() {
    let env = adult_fake_env();
    let output = gremlins_run_cmd(&env).output().expect("command should run");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();

    assert!(stdout.contains("gremlins mutation report"));
    assert!(stdout.contains("Mutation score: 50.0%"));
    assert!(stdout.contains("src/adult.py:2  >= to >  (comparison)"));
    assert!(stdout.contains("constant 18 to 17"));
}

#[cfg(unix)]
#[test]
fn html_report_is_written_on_request() {
    let env = adult_fake_env();
    let mut cmd = gremlins_run_cmd(&env);
    cmd.args(["--report", "html"]);
    cmd.output().expect("command should run");

    let html = fs::read_to_string(env.out_dir.join("report.html")).expect("read html report");
    assert!(html.contains("Mutation score: <strong>50.0%</strong>"));
}

#[test]
fn clear_cache_reports_count() {
    let dir = TempDir::new().expect("TempDir should create");
    let cache_dir = dir.path().join("cache");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gremlins"));
    cmd.args([
        "clear-cache",
        "--project",
        "tests/fixtures/adult_project",
        "--cache-dir",
        cache_dir.to_str().unwrap(),
    ])
    .env("NO_COLOR", "1");

    let output = cmd.output().expect("command should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(stdout.contains("cleared 0 cached results"));
}

#[test]
fn unspawnable_runner_fails_with_exit_1() {
    let dir = TempDir::new().expect("TempDir should create");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gremlins"));
    cmd.args([
        "run",
        "--project",
        "tests/fixtures/adult_project",
        "--runner",
        "/no/such/runner",
        "--cache-dir",
        dir.path().join("cache").to_str().unwrap(),
        "--out-dir",
        dir.path().join("out").to_str().unwrap(),
    ])
    .env("NO_COLOR", "1");

    let output = cmd.output().expect("command should run");
    assert_eq!(output.status.code(), Some(1));
}
