use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;

use crate::pool::PoolConfig;
use crate::project::DEFAULT_CACHE_DIR;

/// Report format(s) to emit after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Console,
    Html,
    Json,
    All,
}

impl ReportFormat {
    pub fn wants_console(self) -> bool {
        matches!(self, ReportFormat::Console | ReportFormat::All)
    }

    pub fn wants_html(self) -> bool {
        matches!(self, ReportFormat::Html | ReportFormat::All)
    }

    pub fn wants_json(self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::All)
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(ReportFormat::Console),
            "html" => Ok(ReportFormat::Html),
            "json" => Ok(ReportFormat::Json),
            "all" => Ok(ReportFormat::All),
            other => bail!("invalid report format {other:?}, expected console, html, json, or all"),
        }
    }
}

/// Resolved configuration for one mutation run.
///
/// The CLI (or a config file upstream of it) produces this record; the
/// orchestrator consumes it.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Project root directory.
    pub project_root: PathBuf,

    /// Source roots to mutate, relative to the project root. Empty means
    /// auto-detect (`src` when present, else the root).
    pub targets: Vec<PathBuf>,

    /// Exclusion globs matched against root-relative paths.
    pub exclude: Vec<String>,

    /// Enabled operator subset; `None` enables all built-ins.
    pub operators: Option<Vec<String>>,

    /// Report format(s) to write.
    pub report: ReportFormat,

    /// Whether the incremental result cache participates.
    pub cache_enabled: bool,

    /// Cache directory override; defaults to `.gremlins-cache` in the root.
    pub cache_dir: Option<PathBuf>,

    /// Output directory for report files.
    pub out_dir: Option<PathBuf>,

    /// Worker pool knobs.
    pub pool: PoolConfig,

    /// Use weighted distribution instead of round-robin.
    pub weighted: bool,

    /// Minimum acceptable mutation score; below it the exit code is 2.
    pub min_score: Option<f64>,

    /// Host test-runner command line.
    pub runner_command: String,

    /// Machine-readable run report on stdout.
    pub json_output: bool,

    /// Extra detail in console output.
    pub verbose: bool,
}

impl RunConfig {
    /// Defaults for a project root; the CLI layers flags on top.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            targets: Vec::new(),
            exclude: Vec::new(),
            operators: None,
            report: ReportFormat::Console,
            cache_enabled: true,
            cache_dir: None,
            out_dir: None,
            pool: PoolConfig::default(),
            weighted: false,
            min_score: None,
            runner_command: "pytest".to_string(),
            json_output: false,
            verbose: false,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join(DEFAULT_CACHE_DIR))
    }

    pub fn instrumented_dir(&self) -> PathBuf {
        self.cache_dir().join("instrumented")
    }

    pub fn results_db_path(&self) -> PathBuf {
        self.cache_dir().join("results.db")
    }

    pub fn coverage_snapshot_path(&self) -> PathBuf {
        self.cache_dir().join("coverage.json")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join("gremlins.out"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_format_parses() {
        assert_eq!("console".parse::<ReportFormat>().unwrap(), ReportFormat::Console);
        assert_eq!("all".parse::<ReportFormat>().unwrap(), ReportFormat::All);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn all_wants_everything() {
        let all = ReportFormat::All;
        assert!(all.wants_console() && all.wants_html() && all.wants_json());
        assert!(!ReportFormat::Json.wants_console());
    }

    #[test]
    fn cache_dir_defaults_under_root() {
        let config = RunConfig::new(PathBuf::from("/proj"));
        assert_eq!(config.cache_dir(), PathBuf::from("/proj/.gremlins-cache"));
        assert_eq!(
            config.results_db_path(),
            PathBuf::from("/proj/.gremlins-cache/results.db")
        );
    }

    #[test]
    fn cache_dir_override_wins() {
        let mut config = RunConfig::new(PathBuf::from("/proj"));
        config.cache_dir = Some(PathBuf::from("/elsewhere"));
        assert_eq!(config.instrumented_dir(), PathBuf::from("/elsewhere/instrumented"));
    }
}
