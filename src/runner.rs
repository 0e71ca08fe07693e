//! Host test-runner subprocess protocol.
//!
//! The runner is an opaque command (pytest-shaped by default) driven three
//! ways:
//!
//! - enumeration: `<runner> --collect-only -q` prints one test id per line;
//! - coverage: with `GREMLINS_COVERAGE_FILE=<path>` set, a full run writes
//!   per-test `(path, line)` coverage JSON to that file;
//! - filtered run: `<runner> -x -q <test-id>...` runs exactly those tests,
//!   stops at the first failure, exits non-zero iff one failed, and names
//!   the failure on a `FAILED <test-id>` line.
//!
//! `ACTIVE_GREMLIN` is always present in the child environment; empty means
//! no mutation is active.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::instrument::ACTIVE_GREMLIN_ENV;

/// Environment variable telling the runner where to write coverage JSON.
pub const COVERAGE_FILE_ENV: &str = "GREMLINS_COVERAGE_FILE";

/// Environment variable pointing workers at the instrumented-sources
/// manifest so the runner imports mutated modules instead of the originals.
pub const SOURCES_FILE_ENV: &str = "GREMLINS_SOURCES_FILE";

/// One configured host runner rooted at the project directory.
#[derive(Debug, Clone)]
pub struct TestRunner {
    argv: Vec<String>,
    rootdir: PathBuf,
    extra_env: Vec<(String, String)>,
}

/// Outcome of one filtered test run.
#[derive(Debug, Clone, PartialEq)]
pub enum TestRunOutcome {
    /// Every selected test passed.
    Passed { duration: Duration },
    /// A test failed; the id is parsed from the runner's summary when
    /// present.
    Failed {
        failing_test: Option<String>,
        duration: Duration,
    },
    /// The runner exceeded the deadline and was killed.
    TimedOut { duration: Duration },
}

/// Captured output of a completed (non-timed-out) runner invocation.
#[derive(Debug)]
pub struct RunnerOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl TestRunner {
    /// Build a runner from a command line such as `pytest` or
    /// `python -m pytest`.
    pub fn new(command: &str, rootdir: PathBuf) -> Result<Self> {
        let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            bail!("test runner command is empty");
        }
        Ok(Self {
            argv,
            rootdir,
            extra_env: Vec::new(),
        })
    }

    /// Add an environment variable to every invocation.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd.current_dir(&self.rootdir);
        for (key, value) in &self.extra_env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Enumerate the currently collectable tests.
    pub fn list_tests(&self) -> Result<Vec<String>> {
        let mut cmd = self.base_command();
        cmd.args(["--collect-only", "-q"]);
        cmd.env(ACTIVE_GREMLIN_ENV, "");

        let output = run_to_completion(cmd)
            .with_context(|| format!("failed to run `{}` to collect tests", self.command_line()))?;
        if !output.success {
            bail!(
                "test collection failed (exit code {:?}):\n{}",
                output.exit_code,
                output.stderr
            );
        }

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.contains("::"))
            .map(str::to_string)
            .collect())
    }

    /// Run the whole suite once in coverage mode, writing JSON to `out`.
    ///
    /// A failing baseline suite is fatal: its coverage would misattribute
    /// lines and every mutation would look detected.
    pub fn collect_coverage(&self, out: &Path) -> Result<()> {
        let mut cmd = self.base_command();
        cmd.arg("-q");
        cmd.env(ACTIVE_GREMLIN_ENV, "");
        cmd.env(COVERAGE_FILE_ENV, out);

        let output = run_to_completion(cmd)
            .with_context(|| format!("failed to run `{}` for coverage", self.command_line()))?;
        if !output.success {
            bail!(
                "coverage collection failed (exit code {:?}); fix the failing suite first:\n{}{}",
                output.exit_code,
                output.stdout,
                output.stderr
            );
        }
        if !out.exists() {
            bail!(
                "runner exited cleanly but wrote no coverage data to {:?}",
                out
            );
        }
        Ok(())
    }

    /// Run the given tests fail-fast with a mutation activated.
    pub fn run_tests(
        &self,
        tests: &[String],
        active_gremlin: &str,
        timeout: Duration,
    ) -> Result<TestRunOutcome> {
        let mut cmd = self.base_command();
        cmd.args(["-x", "-q"]);
        cmd.args(tests);
        cmd.env(ACTIVE_GREMLIN_ENV, active_gremlin);

        let started = Instant::now();
        match run_with_timeout(cmd, timeout)? {
            None => Ok(TestRunOutcome::TimedOut {
                duration: started.elapsed(),
            }),
            Some(output) if output.success => Ok(TestRunOutcome::Passed {
                duration: output.duration,
            }),
            Some(output) => Ok(TestRunOutcome::Failed {
                failing_test: parse_failing_test(&output.stdout)
                    .or_else(|| parse_failing_test(&output.stderr)),
                duration: output.duration,
            }),
        }
    }
}

/// First test id named on a `FAILED <id>` summary line.
pub fn parse_failing_test(output: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("FAILED ") {
            let id = rest.split_whitespace().next().unwrap_or("");
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

fn run_to_completion(mut cmd: Command) -> Result<RunnerOutput> {
    let started = Instant::now();
    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("failed to spawn test runner")?;

    Ok(RunnerOutput {
        exit_code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration: started.elapsed(),
    })
}

/// Run a command with a deadline. `Ok(None)` means it was killed on timeout.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Option<RunnerOutput>> {
    let started = Instant::now();
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .context("failed to spawn test runner")?;

    // Pipes must drain concurrently or a chatty runner deadlocks on a full
    // pipe buffer while we wait for it.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_all(stdout));
    let stderr_reader = std::thread::spawn(move || read_all(stderr));

    loop {
        if let Some(status) = child.try_wait().context("failed to poll test runner")? {
            let stdout = stdout_reader.join().unwrap_or_default();
            let stderr = stderr_reader.join().unwrap_or_default();
            return Ok(Some(RunnerOutput {
                exit_code: status.code(),
                success: status.success(),
                stdout,
                stderr,
                duration: started.elapsed(),
            }));
        }

        if started.elapsed() >= timeout {
            child.kill().ok();
            child.wait().ok();
            // The reader threads are left to drain on their own: grandchild
            // processes may still hold the pipe write ends, and joining here
            // would block until they exit.
            return Ok(None);
        }

        std::thread::sleep(Duration::from_millis(20));
    }
}

fn read_all(pipe: Option<impl std::io::Read>) -> String {
    use std::io::Read;
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_string(&mut buf).ok();
    }
    buf
}
