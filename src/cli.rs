use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cache::IncrementalCache;
use crate::operators::OperatorRegistry;
use crate::options::{ReportFormat, RunConfig};
use crate::orchestrator;
use crate::pool::{default_workers, StartMethod};
use crate::project::{scan_project, ProjectOverview};
use crate::report::{print_report, ReportContext};
use crate::run_report::MutationRunReport;
use crate::ui::Ui;

/// Top-level CLI arguments for the `gremlins` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gremlins",
    version,
    about = "Coverage-guided incremental mutation testing for Python test suites"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands supported by `gremlins`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Count mutation points without running any tests.
    Scan {
        /// Path to the project root.
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Source roots to mutate, relative to the project root.
        #[arg(long, value_delimiter = ',')]
        targets: Vec<PathBuf>,

        /// Glob patterns for files to exclude.
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Comma-separated operator subset to enable.
        #[arg(long, value_delimiter = ',')]
        operators: Vec<String>,
    },

    /// Run mutation testing.
    Run(RunArgs),

    /// Internal: worker-process mode, spawned by `run`. Reads its job as
    /// JSON from stdin and reports results on stdout.
    #[command(hide = true)]
    Worker,

    /// Delete every cached result.
    ClearCache {
        /// Path to the project root.
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Cache directory override.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

/// Flags for the `run` subcommand.
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the project root.
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Source roots to mutate, relative to the project root.
    #[arg(long, value_delimiter = ',')]
    pub targets: Vec<PathBuf>,

    /// Glob patterns for files to exclude.
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Comma-separated operator subset to enable.
    #[arg(long, value_delimiter = ',')]
    pub operators: Vec<String>,

    /// Report format: console, html, json, or all.
    #[arg(long, default_value = "console")]
    pub report: String,

    /// Directory for report files.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Disable the incremental result cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Clear cached results before running.
    #[arg(long)]
    pub clear_cache: bool,

    /// Cache directory override.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Worker process count; defaults to the logical CPU count.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Run everything on a single worker.
    #[arg(long)]
    pub sequential: bool,

    /// Gremlins per work item.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Balance work by selected-test counts instead of round-robin.
    #[arg(long)]
    pub weighted: bool,

    /// Worker start method: auto, spawn, fork, or forkserver.
    #[arg(long, default_value = "auto")]
    pub start_method: String,

    /// Skip the per-worker warmup pass.
    #[arg(long)]
    pub no_warmup: bool,

    /// Per-gremlin timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fail (exit code 2) when the score drops below this percentage.
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Host test-runner command.
    #[arg(long, default_value = "pytest")]
    pub runner: String,

    /// Emit the machine-readable run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Extra detail in console output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse CLI arguments and dispatch the selected command.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            project,
            targets,
            exclude,
            operators,
        } => {
            let ui = Ui::new(false);
            let registry = OperatorRegistry::builtin();
            let enabled_names: Option<Vec<String>> =
                if operators.is_empty() { None } else { Some(operators) };
            let enabled = registry.enabled(enabled_names.as_deref());

            ui.title("gremlins: scan");
            let overview = scan_project(&project, &targets, &exclude, &enabled)?;
            print_scan_summary(&ui, &overview);
            Ok(ExitCode::SUCCESS)
        }

        Command::Run(args) => run_command(args),

        Command::Worker => {
            crate::worker::run_worker()?;
            Ok(ExitCode::SUCCESS)
        }

        Command::ClearCache { project, cache_dir } => {
            let ui = Ui::new(false);
            let mut config = RunConfig::new(project);
            config.cache_dir = cache_dir;

            let mut cache = IncrementalCache::open(&config.results_db_path())?;
            let before = cache.entry_count();
            cache.clear()?;
            ui.line(format!("cleared {before} cached results"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_command(args: RunArgs) -> Result<ExitCode> {
    let ui = Ui::new(args.json);
    let config = build_run_config(&args)?;

    ui.title("gremlins: run");
    ui.line(format!("project: {}", config.project_root.display()));

    if args.clear_cache {
        match IncrementalCache::open(&config.results_db_path()) {
            Ok(mut cache) => {
                cache.clear()?;
                ui.line("cache cleared");
            }
            Err(e) => ui.warn(format!("could not clear cache: {e}")),
        }
    }

    let output = match orchestrator::run(&config, &ui) {
        Ok(output) => output,
        Err(e) => {
            if config.json_output {
                let report =
                    MutationRunReport::failure(config.project_root.clone(), format!("{e:#}"));
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            ui.error(format!("run failed: {e:#}"));
            return Ok(ExitCode::FAILURE);
        }
    };

    let report = MutationRunReport::success(
        config.project_root.clone(),
        output.source_files,
        output.skipped_files,
        output.dispatched,
        output.uncovered,
        output.cache,
        &output.score,
    );

    if config.report.wants_console() {
        let ctx = ReportContext {
            cache: output.cache,
            dispatched: output.dispatched,
            uncovered: output.uncovered,
            verbose: config.verbose,
        };
        print_report(&ui, &output.score, &ctx);
    }
    if config.report.wants_json() {
        crate::out::write_json_report(&config.out_dir(), &report)?;
        ui.line(format!(
            "json report: {}",
            config.out_dir().join("report.json").display()
        ));
    }
    if config.report.wants_html() {
        crate::out::write_html_report(&config.out_dir(), &output.score)?;
        ui.line(format!(
            "html report: {}",
            config.out_dir().join("report.html").display()
        ));
    }
    crate::out::write_missed_txt(&config.out_dir(), &output.score)?;

    if config.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if let Some(min_score) = config.min_score {
        if output.score.total > 0 && output.score.percentage() < min_score {
            ui.error(format!(
                "mutation score {:.1}% is below the required {:.1}%",
                output.score.percentage(),
                min_score
            ));
            return Ok(ExitCode::from(2));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_run_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = RunConfig::new(args.project.clone());
    config.targets = args.targets.clone();
    config.exclude = args.exclude.clone();
    config.operators = if args.operators.is_empty() {
        None
    } else {
        Some(args.operators.clone())
    };
    config.report = args.report.parse::<ReportFormat>()?;
    config.out_dir = args.out_dir.clone();
    config.cache_enabled = !args.no_cache;
    config.cache_dir = args.cache_dir.clone();
    config.weighted = args.weighted;
    config.min_score = args.min_score;
    config.runner_command = args.runner.clone();
    config.json_output = args.json;
    config.verbose = args.verbose;

    config.pool.workers = if args.sequential {
        1
    } else {
        args.workers.unwrap_or_else(default_workers)
    };
    if let Some(timeout) = args.timeout {
        config.pool.timeout = Duration::from_secs(timeout);
    }
    if let Some(batch_size) = args.batch_size {
        config.pool.batch_size = batch_size;
    }
    config.pool.start_method = args.start_method.parse::<StartMethod>()?;
    config.pool.warmup = !args.no_warmup;
    config.pool.validate()?;

    Ok(config)
}

fn print_scan_summary(ui: &Ui, overview: &ProjectOverview) {
    ui.line("--- project overview ---");
    ui.line(format!("project root:      {}", overview.root.display()));
    ui.line(format!("source files:      {}", overview.source_files));
    if overview.skipped_files > 0 {
        ui.line(format!("skipped files:     {}", overview.skipped_files));
    }
    ui.line(format!("code lines:        {}", overview.code_lines));
    ui.line(format!("mutation points:   {}", overview.mutation_points));
    for (operator, count) in &overview.by_operator {
        ui.line(format!("  {operator:<12} {count}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "gremlins",
            "run",
            "--project",
            "/tmp/proj",
            "--operators",
            "comparison,boundary",
            "--workers",
            "4",
            "--batch-size",
            "5",
            "--weighted",
            "--min-score",
            "80",
            "--report",
            "all",
        ])
        .expect("parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.operators, vec!["comparison", "boundary"]);
        assert_eq!(args.workers, Some(4));
        assert!(args.weighted);

        let config = build_run_config(&args).expect("config");
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.pool.batch_size, 5);
        assert_eq!(config.min_score, Some(80.0));
        assert_eq!(config.report, ReportFormat::All);
    }

    #[test]
    fn sequential_forces_one_worker() {
        let cli = Cli::try_parse_from(["gremlins", "run", "--sequential", "--workers", "8"])
            .expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let config = build_run_config(&args).expect("config");
        assert_eq!(config.pool.workers, 1);
    }

    #[test]
    fn bad_report_format_is_rejected() {
        let cli = Cli::try_parse_from(["gremlins", "run", "--report", "pdf"]).expect("parse flags");
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(build_run_config(&args).is_err());
    }

    #[test]
    fn scan_defaults_to_current_dir() {
        let cli = Cli::try_parse_from(["gremlins", "scan"]).expect("parse");
        let Command::Scan { project, .. } = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(project, PathBuf::from("."));
    }
}
