//! End-to-end pipeline for one mutation run.
//!
//! discover sources -> hash -> collect coverage -> instrument -> select
//! tests and probe the cache -> run misses through the pool -> flush the
//! cache -> aggregate. Only coverage collection is allowed to abort the run;
//! every other failure degrades to a warning or a per-gremlin status so a
//! score always comes out.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::aggregate::{MutationScore, ResultAggregator};
use crate::batch::{partition, WorkUnit};
use crate::cache::{CacheStats, CachedOutcome, IncrementalCache};
use crate::coverage::{CoverageData, CoverageMap};
use crate::distribution::{DistributionStrategy, RoundRobinDistribution, WeightedDistribution};
use crate::finder::{count_mutations, IdGen};
use crate::gremlin::{Catalogue, Gremlin};
use crate::hasher::ContentHasher;
use crate::instrument::instrument_module;
use crate::operators::OperatorRegistry;
use crate::options::RunConfig;
use crate::pool::{self, CancelToken, WorkerContext};
use crate::results::{GremlinStatus, ResultRecord, WorkerResult};
use crate::runner::{TestRunner, SOURCES_FILE_ENV};
use crate::selector::TestSelector;
use crate::source::SourceFile;
use crate::syntax::{parse_module, Module};
use crate::ui::Ui;

/// Everything a presentation layer needs after a run.
#[derive(Debug)]
pub struct RunOutput {
    pub score: MutationScore,
    pub source_files: usize,
    pub skipped_files: usize,
    /// Gremlins actually sent to the worker pool.
    pub dispatched: usize,
    /// Gremlins auto-survived for lack of coverage.
    pub uncovered: usize,
    pub cache: CacheStats,
}

impl RunOutput {
    fn empty() -> Self {
        Self {
            score: MutationScore::from_records(Vec::new()),
            source_files: 0,
            skipped_files: 0,
            dispatched: 0,
            uncovered: 0,
            cache: CacheStats::default(),
        }
    }
}

/// Run the whole pipeline for `config`.
pub fn run(config: &RunConfig, ui: &Ui) -> Result<RunOutput> {
    let hasher = ContentHasher::new();

    // 1. Discover sources.
    let sources =
        crate::project::discover_sources(&config.project_root, &config.targets, &config.exclude)?;
    if sources.is_empty() {
        ui.warn("no mutable sources found; nothing to do");
        return Ok(RunOutput::empty());
    }

    // 2. Hash sources, dropping unreadable files with a warning.
    let mut skipped_files = 0usize;
    let mut loaded: Vec<(SourceFile, String, String)> = Vec::new();
    for source in sources {
        match source.read_to_string() {
            Ok(text) => {
                let hash = hasher.hash_str(&text);
                loaded.push((source, text, hash));
            }
            Err(e) => {
                warn!(file = %source.relative_path().display(), error = %e, "unreadable source, skipping");
                skipped_files += 1;
            }
        }
    }

    // 3. Enumerate tests and collect (or reuse) coverage. Failures here are
    //    fatal: wrong selection data would corrupt every downstream verdict.
    let runner = TestRunner::new(&config.runner_command, config.project_root.clone())?;
    let tests = runner.list_tests().context("test enumeration failed")?;
    debug!(tests = tests.len(), "enumerated tests");

    let test_file_hashes = hash_test_files(&hasher, config, &tests);
    let coverage = load_or_collect_coverage(config, &runner, &hasher, &loaded, &test_file_hashes)?;
    let coverage_map = CoverageMap::from_data(&coverage);
    if config.verbose {
        for (path, line, count) in coverage_map.incidentally_tested(10).iter().take(5) {
            ui.line(format!(
                "incidentally tested: {}:{line} is hit by {count} tests",
                path.display()
            ));
        }
    }
    let selector = TestSelector::new(coverage_map, tests);

    // 4. Parse and instrument; parse errors exclude the file only.
    let mut parsed: Vec<(SourceFile, Module, String)> = Vec::new();
    for (source, text, hash) in loaded {
        match parse_module(&text) {
            Ok(module) => parsed.push((source, module, hash)),
            Err(e) => {
                warn!(file = %source.relative_path().display(), error = %e, "parse error, no gremlins from this file");
                ui.warn(format!(
                    "skipping {} ({e})",
                    source.relative_path().display()
                ));
                skipped_files += 1;
            }
        }
    }
    if parsed.is_empty() {
        ui.warn("no parseable sources; nothing to do");
        return Ok(RunOutput::empty());
    }

    let registry = OperatorRegistry::builtin();
    let operators = registry.enabled(config.operators.as_deref());

    let total: usize = parsed
        .iter()
        .map(|(_, module, _)| count_mutations(module, &operators))
        .sum();
    let mut ids = IdGen::new(total);

    let instrumented_dir = config.instrumented_dir();
    fs::create_dir_all(&instrumented_dir)
        .with_context(|| format!("failed to create {:?}", instrumented_dir))?;

    let mut gremlins: Vec<Gremlin> = Vec::new();
    let mut source_hashes: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut manifest: BTreeMap<String, String> = BTreeMap::new();
    for (source, module, hash) in &parsed {
        let rel = source.relative_path();
        let result = instrument_module(module, rel, &operators, &mut ids);
        gremlins.extend(result.gremlins);

        let out_path = instrumented_dir.join(rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        fs::write(&out_path, crate::syntax::print_module(&result.module))
            .with_context(|| format!("failed to write instrumented module {:?}", out_path))?;

        source_hashes.insert(rel.to_path_buf(), hash.clone());
        manifest.insert(
            rel.to_string_lossy().into_owned(),
            out_path.to_string_lossy().into_owned(),
        );
    }
    let catalogue = Catalogue::from_gremlins(gremlins);
    let source_files = parsed.len();

    if catalogue.is_empty() {
        ui.warn("no gremlins discovered; nothing to do");
        return Ok(RunOutput {
            score: MutationScore::from_records(Vec::new()),
            source_files,
            skipped_files,
            dispatched: 0,
            uncovered: 0,
            cache: CacheStats::default(),
        });
    }
    ui.line(format!(
        "discovered {} gremlins across {} files",
        catalogue.len(),
        source_files
    ));

    let manifest_path = crate::out::write_sources_manifest(&instrumented_dir, &manifest)?;
    let worker_context = WorkerContext {
        runner_command: config.runner_command.clone(),
        rootdir: config.project_root.clone(),
        env: vec![(
            SOURCES_FILE_ENV.to_string(),
            manifest_path.to_string_lossy().into_owned(),
        )],
    };

    // 5. Select tests and probe the cache.
    let mut cache = if config.cache_enabled {
        match IncrementalCache::open(&config.results_db_path()) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "cache unavailable, running without it");
                None
            }
        }
    } else {
        None
    };

    let mut records: Vec<ResultRecord> = Vec::new();
    let mut units: Vec<WorkUnit> = Vec::new();
    // Per-gremlin key material for caching fresh results after the run.
    let mut key_material: BTreeMap<String, (String, BTreeMap<String, String>)> = BTreeMap::new();
    let mut uncovered = 0usize;

    for gremlin in catalogue.iter() {
        let selected = selector.select_for_gremlin(gremlin);
        if selected.is_empty() {
            // Nothing can observe this mutation; it survives by default and
            // no subprocess is spent on it.
            uncovered += 1;
            records.push(record_for(
                gremlin,
                GremlinStatus::Survived,
                None,
                None,
                false,
            ));
            continue;
        }

        let source_hash = source_hashes
            .get(&gremlin.path)
            .cloned()
            .unwrap_or_default();
        let covering_hashes: BTreeMap<String, String> = selector
            .test_files_for(&selected)
            .into_iter()
            .filter_map(|file| {
                test_file_hashes
                    .get(file)
                    .map(|hash| (file.to_string(), hash.clone()))
            })
            .collect();

        if let Some(cache) = cache.as_mut() {
            if let Some(hit) = cache.get(&gremlin.id, &source_hash, &covering_hashes) {
                records.push(record_for(
                    gremlin,
                    hit.status,
                    hit.killing_test,
                    None,
                    true,
                ));
                continue;
            }
        }

        key_material.insert(gremlin.id.clone(), (source_hash, covering_hashes));
        units.push(WorkUnit {
            gremlin_id: gremlin.id.clone(),
            path: gremlin.path.clone(),
            tests: selected,
        });
    }

    // 6. Run the misses.
    let dispatched = units.len();
    if dispatched > 0 {
        let batches = partition(units, config.pool.batch_size);
        let strategy: &dyn DistributionStrategy = if config.weighted {
            &WeightedDistribution
        } else {
            &RoundRobinDistribution
        };
        debug!(
            strategy = strategy.name(),
            batches = batches.len(),
            workers = config.pool.workers,
            "distributing work"
        );
        let buckets = strategy.distribute(batches, config.pool.workers);

        let aggregator = ResultAggregator::new(dispatched);
        let cancel = CancelToken::new();
        let worker_exe =
            std::env::current_exe().context("failed to locate the running executable")?;
        pool::execute(
            &config.pool,
            &worker_exe,
            &worker_context,
            buckets,
            &cancel,
            |result: WorkerResult| {
                ui.gremlin_progress(catalogue.get(&result.gremlin_id), &result);
                if let (Some(cache), Some((source_hash, covering))) = (
                    cache.as_mut(),
                    key_material.get(&result.gremlin_id),
                ) {
                    cache.put_deferred(
                        &result.gremlin_id,
                        source_hash,
                        covering,
                        &CachedOutcome {
                            status: result.status,
                            killing_test: result.killing_test.clone(),
                        },
                    );
                }
                aggregator.add_result(result);
            },
        )?;

        for result in aggregator.into_results() {
            let Some(gremlin) = catalogue.get(&result.gremlin_id) else {
                warn!(id = %result.gremlin_id, "result for unknown gremlin, dropping");
                continue;
            };
            records.push(record_for(
                gremlin,
                result.status,
                result.killing_test,
                result.execution_time_ms,
                false,
            ));
        }
    }

    // 7. Make the fresh outcomes durable.
    let cache_stats = match cache.as_mut() {
        Some(cache) => {
            cache.flush();
            cache.stats()
        }
        None => CacheStats::default(),
    };

    // 8. Aggregate.
    Ok(RunOutput {
        score: MutationScore::from_records(records),
        source_files,
        skipped_files,
        dispatched,
        uncovered,
        cache: cache_stats,
    })
}

fn record_for(
    gremlin: &Gremlin,
    status: GremlinStatus,
    killing_test: Option<String>,
    execution_time_ms: Option<f64>,
    from_cache: bool,
) -> ResultRecord {
    ResultRecord {
        id: gremlin.id.clone(),
        path: gremlin.path.clone(),
        line: gremlin.line,
        operator: gremlin.operator.clone(),
        description: gremlin.description.clone(),
        status,
        killing_test,
        execution_time_ms,
        from_cache,
    }
}

fn hash_test_files(
    hasher: &ContentHasher,
    config: &RunConfig,
    tests: &[String],
) -> BTreeMap<String, String> {
    let mut hashes = BTreeMap::new();
    for test in tests {
        let Some(file) = crate::selector::test_file_of(test) else {
            continue;
        };
        if hashes.contains_key(file) {
            continue;
        }
        match hasher.hash_file(&config.project_root.join(file)) {
            Ok(hash) => {
                hashes.insert(file.to_string(), hash);
            }
            Err(e) => {
                warn!(file, error = %e, "cannot hash test file; caching will treat it as empty");
                hashes.insert(file.to_string(), String::new());
            }
        }
    }
    hashes
}

/// Reuse the cached coverage snapshot when neither sources nor test files
/// changed since it was taken; otherwise run the suite in coverage mode.
fn load_or_collect_coverage(
    config: &RunConfig,
    runner: &TestRunner,
    hasher: &ContentHasher,
    loaded: &[(SourceFile, String, String)],
    test_file_hashes: &BTreeMap<String, String>,
) -> Result<CoverageData> {
    let snapshot_path = config.coverage_snapshot_path();
    let meta_path = snapshot_path.with_extension("json.meta");

    let mut inputs: Vec<String> = loaded.iter().map(|(_, _, hash)| hash.clone()).collect();
    inputs.extend(test_file_hashes.values().cloned());
    inputs.sort();
    let freshness = hasher.hash_combined(&inputs);

    if snapshot_path.exists() {
        let fresh = fs::read_to_string(&meta_path)
            .map(|m| m.trim() == freshness)
            .unwrap_or(false);
        if fresh {
            match CoverageData::load(&snapshot_path) {
                Ok(data) => {
                    debug!("reusing coverage snapshot");
                    return Ok(data);
                }
                Err(e) => warn!(error = %e, "stale coverage snapshot unreadable, recollecting"),
            }
        }
    }

    if let Some(parent) = snapshot_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache dir {:?}", parent))?;
    }
    runner
        .collect_coverage(&snapshot_path)
        .context("coverage collection failed")?;
    let data = CoverageData::load(&snapshot_path).context("coverage output unreadable")?;
    fs::write(&meta_path, &freshness).ok();
    Ok(data)
}
