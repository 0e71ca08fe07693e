//! The worker half of the process pool.
//!
//! `gremlins worker` is only ever spawned by the orchestrating process. It
//! reads one JSON job description from stdin, runs each gremlin's selected
//! tests with the activation key set on the runner subprocess, and prints
//! one JSON result per line so the parent can stream progress. State never
//! flows back except through those report lines.

use std::io::{self, BufWriter, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::pool::WorkerSpec;
use crate::results::WorkerResult;
use crate::runner::{TestRunOutcome, TestRunner};

/// Entry point for the hidden `worker` subcommand.
pub fn run_worker() -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read worker job from stdin")?;
    let spec: WorkerSpec = serde_json::from_str(&input).context("malformed worker job")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run_spec(&spec, &mut out)?;
    out.flush().context("failed to flush worker reports")?;
    Ok(())
}

/// Process every unit in the job, writing one report line per gremlin.
///
/// Units run in the given order; the activation key is re-set per gremlin on
/// the runner invocation, so one worker serves a whole batch without any
/// shared mutable state.
pub fn run_spec(spec: &WorkerSpec, out: &mut impl Write) -> Result<()> {
    let mut runner = TestRunner::new(&spec.context.runner_command, spec.context.rootdir.clone())?;
    for (key, value) in &spec.context.env {
        runner = runner.with_env(key, value);
    }
    let timeout = Duration::from_secs(spec.timeout_secs.max(1));

    if spec.warmup {
        // One throwaway enumeration primes the runner's import and bytecode
        // caches before the first real invocation.
        let _ = runner.list_tests();
    }

    for batch in &spec.batches {
        for unit in &batch.units {
            let result = run_unit(&runner, &unit.gremlin_id, &unit.tests, timeout);
            let line = serde_json::to_string(&result).context("encode worker report")?;
            writeln!(out, "{line}").context("write worker report")?;
            // Flush per gremlin so the parent sees progress live.
            out.flush().ok();
        }
    }
    Ok(())
}

fn run_unit(
    runner: &TestRunner,
    gremlin_id: &str,
    tests: &[String],
    timeout: Duration,
) -> WorkerResult {
    match runner.run_tests(tests, gremlin_id, timeout) {
        Ok(TestRunOutcome::Passed { duration }) => {
            WorkerResult::survived(gremlin_id.to_string(), Some(duration.as_secs_f64() * 1000.0))
        }
        Ok(TestRunOutcome::Failed {
            failing_test,
            duration,
        }) => {
            let killer = failing_test
                .or_else(|| tests.first().cloned())
                .unwrap_or_else(|| "unknown".to_string());
            WorkerResult::zapped(
                gremlin_id.to_string(),
                killer,
                duration.as_secs_f64() * 1000.0,
            )
        }
        Ok(TestRunOutcome::TimedOut { duration }) => {
            WorkerResult::timeout(gremlin_id.to_string(), duration.as_secs_f64() * 1000.0)
        }
        Err(e) => {
            warn!(gremlin = gremlin_id, error = %e, "runner invocation failed");
            WorkerResult::error(gremlin_id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::GremlinStatus;

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use crate::batch::{Batch, WorkUnit};
        use crate::pool::WorkerContext;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        fn fake_runner(dir: &TempDir, script: &str) -> PathBuf {
            let path = dir.path().join("fake-runner");
            fs::write(&path, format!("#!/usr/bin/env bash\n{script}")).expect("write script");
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
            path
        }

        fn spec_for(runner: &PathBuf, dir: &TempDir, ids: &[&str], timeout_secs: u64) -> WorkerSpec {
            WorkerSpec {
                context: WorkerContext {
                    runner_command: runner.to_string_lossy().into_owned(),
                    rootdir: dir.path().to_path_buf(),
                    env: Vec::new(),
                },
                timeout_secs,
                warmup: false,
                batches: vec![Batch {
                    units: ids
                        .iter()
                        .map(|id| WorkUnit {
                            gremlin_id: id.to_string(),
                            path: PathBuf::from("src/m.py"),
                            tests: vec!["tests/test_m.py::test_one".to_string()],
                        })
                        .collect(),
                }],
            }
        }

        fn reports(spec: &WorkerSpec) -> Vec<WorkerResult> {
            let mut buf = Vec::new();
            run_spec(spec, &mut buf).expect("run_spec");
            String::from_utf8(buf)
                .expect("utf8 reports")
                .lines()
                .map(|line| serde_json::from_str(line).expect("report line"))
                .collect()
        }

        #[test]
        fn activation_key_selects_the_outcome_per_unit() {
            let dir = TempDir::new().expect("tempdir");
            // Zaps g002 by name, survives everything else.
            let runner = fake_runner(
                &dir,
                "if [ \"$ACTIVE_GREMLIN\" = 'g002' ]; then\n\
                   echo 'FAILED tests/test_m.py::test_one'\n\
                   exit 1\n\
                 fi\n\
                 exit 0\n",
            );

            let spec = spec_for(&runner, &dir, &["g001", "g002", "g003"], 5);
            let results = reports(&spec);

            assert_eq!(results.len(), 3);
            assert_eq!(results[0].status, GremlinStatus::Survived);
            assert_eq!(results[1].status, GremlinStatus::Zapped);
            assert_eq!(
                results[1].killing_test.as_deref(),
                Some("tests/test_m.py::test_one")
            );
            assert_eq!(results[2].status, GremlinStatus::Survived);
        }

        #[test]
        fn hanging_runner_times_out_per_unit() {
            let dir = TempDir::new().expect("tempdir");
            let runner = fake_runner(&dir, "sleep 30\n");

            let spec = spec_for(&runner, &dir, &["g001"], 1);
            let results = reports(&spec);

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].status, GremlinStatus::Timeout);
        }

        #[test]
        fn unspawnable_runner_reports_errors_not_failure() {
            let dir = TempDir::new().expect("tempdir");
            let spec = WorkerSpec {
                context: WorkerContext {
                    runner_command: "/no/such/runner".to_string(),
                    rootdir: dir.path().to_path_buf(),
                    env: Vec::new(),
                },
                timeout_secs: 1,
                warmup: false,
                batches: vec![Batch {
                    units: vec![WorkUnit {
                        gremlin_id: "g001".to_string(),
                        path: PathBuf::from("src/m.py"),
                        tests: Vec::new(),
                    }],
                }],
            };

            let results = reports(&spec);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].status, GremlinStatus::Error);
        }

        #[test]
        fn context_env_reaches_the_runner() {
            let dir = TempDir::new().expect("tempdir");
            let runner = fake_runner(
                &dir,
                "if [ \"$GREMLINS_SOURCES_FILE\" = '/tmp/sources.json' ]; then exit 0; fi\nexit 1\n",
            );

            let mut spec = spec_for(&runner, &dir, &["g001"], 5);
            spec.context.env.push((
                "GREMLINS_SOURCES_FILE".to_string(),
                "/tmp/sources.json".to_string(),
            ));

            let results = reports(&spec);
            assert_eq!(results[0].status, GremlinStatus::Survived);
        }
    }
}
