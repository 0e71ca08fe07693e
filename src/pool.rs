//! Worker pool for parallel mutation runs.
//!
//! Workers are OS-level processes: the orchestrator re-invokes its own
//! executable as a hidden `worker` subcommand, pipes the worker's batches to
//! it as one JSON document on stdin, and reads one JSON result per line back
//! from its stdout. The process boundary is the fault-isolation guarantee: a
//! worker that crashes, hangs, or corrupts itself loses only its own work
//! items, which the parent reports as `error` results while the other
//! workers keep going. Each worker's pipe is drained by a small reader
//! thread feeding one single-consumer channel.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::results::WorkerResult;

/// How worker processes are started.
///
/// The knob exists for config compatibility; on this runtime every choice
/// resolves to spawning a fresh worker process, which is what `auto` picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMethod {
    #[default]
    Auto,
    Spawn,
    Fork,
    ForkServer,
}

impl FromStr for StartMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(StartMethod::Auto),
            "spawn" => Ok(StartMethod::Spawn),
            "fork" => Ok(StartMethod::Fork),
            "forkserver" => Ok(StartMethod::ForkServer),
            other => bail!(
                "invalid start method {other:?}, expected auto, spawn, fork, or forkserver"
            ),
        }
    }
}

impl StartMethod {
    /// The concrete method `auto` resolves to.
    pub fn resolve(self) -> StartMethod {
        match self {
            StartMethod::Auto => StartMethod::Spawn,
            other => other,
        }
    }
}

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker count; defaults to the logical CPU count.
    pub workers: usize,
    /// Per-gremlin deadline for one runner invocation.
    pub timeout: Duration,
    pub start_method: StartMethod,
    /// Pre-touch the runner once per worker before real work.
    pub warmup: bool,
    /// Gremlins per work item.
    pub batch_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: Duration::from_secs(30),
            start_method: StartMethod::Auto,
            warmup: true,
            batch_size: 10,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be positive");
        }
        if self.timeout.is_zero() {
            bail!("timeout must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        Ok(())
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Shared drain flag for orchestrator-initiated shutdown.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Host-runner settings every worker needs besides its batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerContext {
    pub runner_command: String,
    pub rootdir: PathBuf,
    /// Extra environment for every runner invocation, e.g. the
    /// instrumented-sources manifest location.
    pub env: Vec<(String, String)>,
}

/// The complete job description piped to one worker on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub context: WorkerContext,
    pub timeout_secs: u64,
    pub warmup: bool,
    pub batches: Vec<Batch>,
}

/// Run pre-distributed buckets of batches and stream results to `on_result`.
///
/// `worker_exe` is the executable to spawn per bucket (the running binary in
/// production). Result arrival order across workers is unspecified; callers
/// re-sort by gremlin id. Every dispatched gremlin reaches a terminal state:
/// whatever a worker never reports, including after cancellation or a worker
/// crash, comes back as `error`.
pub fn execute(
    config: &PoolConfig,
    worker_exe: &Path,
    context: &WorkerContext,
    buckets: Vec<Vec<Batch>>,
    cancel: &CancelToken,
    mut on_result: impl FnMut(WorkerResult),
) -> Result<()> {
    config.validate()?;
    debug!(
        start_method = ?config.start_method.resolve(),
        workers = config.workers,
        "starting worker pool"
    );

    let (tx, rx) = mpsc::channel::<WorkerResult>();

    std::thread::scope(|scope| {
        for (worker_index, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let tx = tx.clone();
            let cancel = cancel.clone();
            let worker_exe = worker_exe.to_path_buf();
            let spec = WorkerSpec {
                context: context.clone(),
                timeout_secs: config.timeout.as_secs().max(1),
                warmup: config.warmup,
                batches: bucket,
            };

            scope.spawn(move || pump_worker(worker_index, &worker_exe, spec, &cancel, &tx));
        }
        drop(tx);

        for result in rx {
            on_result(result);
        }
    });

    Ok(())
}

/// Drive one worker subprocess and forward its reports to the channel.
fn pump_worker(
    index: usize,
    worker_exe: &Path,
    spec: WorkerSpec,
    cancel: &CancelToken,
    tx: &mpsc::Sender<WorkerResult>,
) {
    let mut unreported: BTreeSet<String> = spec
        .batches
        .iter()
        .flat_map(|b| b.units.iter().map(|u| u.gremlin_id.clone()))
        .collect();

    if cancel.is_cancelled() {
        drain_as_errors(&unreported, tx);
        return;
    }

    let payload = match serde_json::to_string(&spec) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(worker = index, error = %e, "could not encode worker job");
            drain_as_errors(&unreported, tx);
            return;
        }
    };

    let mut child = match Command::new(worker_exe)
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(worker = index, error = %e, "failed to spawn worker process");
            drain_as_errors(&unreported, tx);
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(payload.as_bytes()) {
            warn!(worker = index, error = %e, "failed to hand job to worker");
        }
        // Dropping stdin closes the pipe; the worker starts on EOF.
    }

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkerResult>(&line) {
                Ok(result) => {
                    unreported.remove(&result.gremlin_id);
                    if tx.send(result).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(worker = index, error = %e, "undecodable worker report line")
                }
            }
            if cancel.is_cancelled() {
                child.kill().ok();
                break;
            }
        }
    }

    match child.wait() {
        Ok(status) if !status.success() => {
            warn!(worker = index, code = ?status.code(), "worker exited abnormally");
        }
        Err(e) => warn!(worker = index, error = %e, "failed to reap worker"),
        _ => {}
    }

    // Whatever the worker never got to still needs a terminal status.
    drain_as_errors(&unreported, tx);
}

fn drain_as_errors(ids: &BTreeSet<String>, tx: &mpsc::Sender<WorkerResult>) {
    for id in ids {
        let _ = tx.send(WorkerResult::error(id.clone()));
    }
}
