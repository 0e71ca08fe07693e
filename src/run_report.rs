use std::path::PathBuf;

use serde::Serialize;

use crate::aggregate::MutationScore;
use crate::cache::CacheStats;
use crate::results::ResultRecord;

/// Summary counts plus the detection percentage.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub zapped: usize,
    pub survived: usize,
    pub timeout: usize,
    pub error: usize,
    pub percentage: f64,
}

impl ScoreSummary {
    pub fn from_score(score: &MutationScore) -> Self {
        Self {
            total: score.total,
            zapped: score.zapped,
            survived: score.survived,
            timeout: score.timeout,
            error: score.error,
            percentage: score.percentage(),
        }
    }
}

/// Machine-readable report for a mutation run.
///
/// In `--json` mode this is printed to stdout as pretty JSON; it is also the
/// payload of the `report.json` file.
#[derive(Debug, Serialize)]
pub struct MutationRunReport {
    /// Tool name, stable across versions.
    pub tool: &'static str,

    /// Current crate version.
    pub version: &'static str,

    /// The project root used for this run.
    pub project_root: PathBuf,

    /// Source files that participated after discovery and parsing.
    pub source_files: usize,

    /// Files dropped by read or parse failures.
    pub skipped_files: usize,

    /// Total gremlins in the catalogue.
    pub discovered: usize,

    /// Gremlins actually dispatched to the worker pool (cache misses with
    /// covering tests).
    pub dispatched: usize,

    /// Gremlins auto-survived because no test covers their line.
    pub uncovered: usize,

    /// Incremental-cache hit/miss counters for this run.
    pub cache: CacheStats,

    /// Aggregate counts and score.
    pub summary: ScoreSummary,

    /// Per-gremlin outcomes sorted by id.
    pub results: Vec<ResultRecord>,

    /// Optional high-level error message (for example coverage failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationRunReport {
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        project_root: PathBuf,
        source_files: usize,
        skipped_files: usize,
        dispatched: usize,
        uncovered: usize,
        cache: CacheStats,
        score: &MutationScore,
    ) -> Self {
        Self {
            tool: "gremlins",
            version: env!("CARGO_PKG_VERSION"),
            project_root,
            source_files,
            skipped_files,
            discovered: score.total,
            dispatched,
            uncovered,
            cache,
            summary: ScoreSummary::from_score(score),
            results: score.records.clone(),
            error: None,
        }
    }

    pub fn failure(project_root: PathBuf, error: String) -> Self {
        Self {
            tool: "gremlins",
            version: env!("CARGO_PKG_VERSION"),
            project_root,
            source_files: 0,
            skipped_files: 0,
            discovered: 0,
            dispatched: 0,
            uncovered: 0,
            cache: CacheStats::default(),
            summary: ScoreSummary::default(),
            results: Vec::new(),
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::GremlinStatus;

    #[test]
    fn success_report_carries_score() {
        let score = MutationScore::from_records(vec![ResultRecord {
            id: "g001".to_string(),
            path: PathBuf::from("src/a.py"),
            line: 1,
            operator: "comparison".to_string(),
            description: ">= to >".to_string(),
            status: GremlinStatus::Zapped,
            killing_test: Some("tests/test_a.py::test_x".to_string()),
            execution_time_ms: Some(10.0),
            from_cache: false,
        }]);

        let report = MutationRunReport::success(
            PathBuf::from("/proj"),
            1,
            0,
            1,
            0,
            CacheStats::default(),
            &score,
        );
        assert_eq!(report.tool, "gremlins");
        assert_eq!(report.discovered, 1);
        assert_eq!(report.summary.percentage, 100.0);
        assert!(report.error.is_none());

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"zapped\""));
    }

    #[test]
    fn failure_report_has_error_and_no_results() {
        let report =
            MutationRunReport::failure(PathBuf::from("/proj"), "coverage failed".to_string());
        assert_eq!(report.error.as_deref(), Some("coverage failed"));
        assert!(report.results.is_empty());
        assert_eq!(report.summary.total, 0);
    }
}
