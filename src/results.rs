use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Outcome of testing a single gremlin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GremlinStatus {
    /// A test failed under the mutation: the suite caught it.
    Zapped,
    /// Every selected test passed: the suite missed it.
    Survived,
    /// The run exceeded its deadline. Counts as detected, since the
    /// behavioural change was observable.
    Timeout,
    /// The runner crashed or could not start.
    Error,
}

impl GremlinStatus {
    /// Whether this status counts toward the detection numerator.
    pub fn is_detected(self) -> bool {
        matches!(self, GremlinStatus::Zapped | GremlinStatus::Timeout)
    }

    pub fn label(self) -> &'static str {
        match self {
            GremlinStatus::Zapped => "zapped",
            GremlinStatus::Survived => "survived",
            GremlinStatus::Timeout => "timeout",
            GremlinStatus::Error => "error",
        }
    }
}

/// Per-gremlin result as it crosses the worker channel.
///
/// Constructors enforce that a killing test is present exactly when the
/// status is `Zapped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub gremlin_id: String,
    pub status: GremlinStatus,
    pub killing_test: Option<String>,
    pub execution_time_ms: Option<f64>,
}

impl WorkerResult {
    pub fn zapped(gremlin_id: String, killing_test: String, execution_time_ms: f64) -> Self {
        Self {
            gremlin_id,
            status: GremlinStatus::Zapped,
            killing_test: Some(killing_test),
            execution_time_ms: Some(execution_time_ms),
        }
    }

    pub fn survived(gremlin_id: String, execution_time_ms: Option<f64>) -> Self {
        Self {
            gremlin_id,
            status: GremlinStatus::Survived,
            killing_test: None,
            execution_time_ms,
        }
    }

    pub fn timeout(gremlin_id: String, execution_time_ms: f64) -> Self {
        Self {
            gremlin_id,
            status: GremlinStatus::Timeout,
            killing_test: None,
            execution_time_ms: Some(execution_time_ms),
        }
    }

    pub fn error(gremlin_id: String) -> Self {
        Self {
            gremlin_id,
            status: GremlinStatus::Error,
            killing_test: None,
            execution_time_ms: None,
        }
    }
}

/// Flat record joining gremlin metadata with its outcome, for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub path: PathBuf,
    pub line: u32,
    pub operator: String,
    pub description: String,
    pub status: GremlinStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killing_test: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    /// True when the outcome came from the incremental cache.
    pub from_cache: bool,
}
