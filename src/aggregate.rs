//! Result aggregation and the mutation score model.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::operators::severity_rank;
use crate::results::{GremlinStatus, ResultRecord, WorkerResult};

/// Thread-safe collector for results arriving from workers.
///
/// Workers finish in arbitrary order; the final list re-sorts by gremlin id
/// so downstream output is deterministic.
pub struct ResultAggregator {
    total: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    results: Vec<WorkerResult>,
    zapped: usize,
    survived: usize,
    timeout: usize,
    error: usize,
}

impl ResultAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn add_result(&self, result: WorkerResult) {
        let mut inner = self.inner.lock().expect("aggregator lock poisoned");
        match result.status {
            GremlinStatus::Zapped => inner.zapped += 1,
            GremlinStatus::Survived => inner.survived += 1,
            GremlinStatus::Timeout => inner.timeout += 1,
            GremlinStatus::Error => inner.error += 1,
        }
        inner.results.push(result);
    }

    pub fn completed(&self) -> usize {
        self.inner.lock().expect("aggregator lock poisoned").results.len()
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.completed(), self.total)
    }

    /// All collected results, sorted by gremlin id.
    pub fn into_results(self) -> Vec<WorkerResult> {
        let mut results = self.inner.into_inner().expect("aggregator lock poisoned").results;
        results.sort_by(|a, b| a.gremlin_id.cmp(&b.gremlin_id));
        results
    }
}

/// Per-file slice of a mutation score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileScore {
    pub total: usize,
    pub zapped: usize,
    pub survived: usize,
    pub timeout: usize,
    pub error: usize,
}

impl FileScore {
    pub fn percentage(&self) -> f64 {
        percentage(self.zapped, self.timeout, self.total)
    }

    fn add(&mut self, status: GremlinStatus) {
        self.total += 1;
        match status {
            GremlinStatus::Zapped => self.zapped += 1,
            GremlinStatus::Survived => self.survived += 1,
            GremlinStatus::Timeout => self.timeout += 1,
            GremlinStatus::Error => self.error += 1,
        }
    }
}

/// Aggregated outcome of a whole run.
///
/// Timeouts count as detected: the mutation observably changed behaviour
/// even if no assertion got the chance to fire.
#[derive(Debug, Clone, Serialize)]
pub struct MutationScore {
    pub total: usize,
    pub zapped: usize,
    pub survived: usize,
    pub timeout: usize,
    pub error: usize,
    pub records: Vec<ResultRecord>,
}

impl MutationScore {
    /// Build a score from final records; records re-sort by gremlin id.
    pub fn from_records(mut records: Vec<ResultRecord>) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let mut score = Self {
            total: records.len(),
            zapped: 0,
            survived: 0,
            timeout: 0,
            error: 0,
            records,
        };
        for record in &score.records {
            match record.status {
                GremlinStatus::Zapped => score.zapped += 1,
                GremlinStatus::Survived => score.survived += 1,
                GremlinStatus::Timeout => score.timeout += 1,
                GremlinStatus::Error => score.error += 1,
            }
        }
        score
    }

    /// Detection percentage: `(zapped + timeout) / total * 100`, 0 when
    /// empty.
    pub fn percentage(&self) -> f64 {
        percentage(self.zapped, self.timeout, self.total)
    }

    /// Scores grouped by source file, keys sorted.
    pub fn by_file(&self) -> BTreeMap<PathBuf, FileScore> {
        let mut files: BTreeMap<PathBuf, FileScore> = BTreeMap::new();
        for record in &self.records {
            files.entry(record.path.clone()).or_default().add(record.status);
        }
        files
    }

    /// Worst surviving gremlins: severity rank first, then file and line.
    pub fn top_survivors(&self, limit: usize) -> Vec<&ResultRecord> {
        let mut survivors: Vec<&ResultRecord> = self
            .records
            .iter()
            .filter(|r| r.status == GremlinStatus::Survived)
            .collect();
        survivors.sort_by(|a, b| {
            severity_rank(&a.operator)
                .cmp(&severity_rank(&b.operator))
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.id.cmp(&b.id))
        });
        survivors.truncate(limit);
        survivors
    }
}

fn percentage(zapped: usize, timeout: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (zapped + timeout) as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, path: &str, operator: &str, status: GremlinStatus) -> ResultRecord {
        ResultRecord {
            id: id.to_string(),
            path: PathBuf::from(path),
            line: 1,
            operator: operator.to_string(),
            description: String::new(),
            status,
            killing_test: None,
            execution_time_ms: None,
            from_cache: false,
        }
    }

    #[test]
    fn counts_and_percentage() {
        let score = MutationScore::from_records(vec![
            record("g001", "a.py", "comparison", GremlinStatus::Zapped),
            record("g002", "a.py", "comparison", GremlinStatus::Survived),
            record("g003", "a.py", "boundary", GremlinStatus::Timeout),
            record("g004", "a.py", "boundary", GremlinStatus::Error),
        ]);

        assert_eq!(score.total, 4);
        assert_eq!(score.zapped, 1);
        assert_eq!(score.survived, 1);
        assert_eq!(score.timeout, 1);
        assert_eq!(score.error, 1);
        // Timeout counts as detected.
        assert!((score.percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_score_is_zero_percent() {
        let score = MutationScore::from_records(Vec::new());
        assert_eq!(score.percentage(), 0.0);
    }

    #[test]
    fn half_detected_is_fifty_percent() {
        let score = MutationScore::from_records(vec![
            record("g001", "a.py", "comparison", GremlinStatus::Survived),
            record("g002", "a.py", "comparison", GremlinStatus::Zapped),
            record("g003", "a.py", "boundary", GremlinStatus::Survived),
            record("g004", "a.py", "boundary", GremlinStatus::Zapped),
        ]);
        assert!((score.percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn per_file_breakdown_stays_in_bounds() {
        let score = MutationScore::from_records(vec![
            record("g001", "a.py", "comparison", GremlinStatus::Zapped),
            record("g002", "b.py", "comparison", GremlinStatus::Survived),
            record("g003", "b.py", "boundary", GremlinStatus::Zapped),
        ]);

        let files = score.by_file();
        assert_eq!(files.len(), 2);
        assert!((files[&PathBuf::from("a.py")].percentage() - 100.0).abs() < f64::EPSILON);
        assert!((files[&PathBuf::from("b.py")].percentage() - 50.0).abs() < f64::EPSILON);
        for file in files.values() {
            let pct = file.percentage();
            assert!((0.0..=100.0).contains(&pct));
        }
    }

    #[test]
    fn top_survivors_rank_by_severity_then_location() {
        let score = MutationScore::from_records(vec![
            record("g001", "b.py", "arithmetic", GremlinStatus::Survived),
            record("g002", "a.py", "comparison", GremlinStatus::Survived),
            record("g003", "a.py", "boolean", GremlinStatus::Survived),
            record("g004", "a.py", "comparison", GremlinStatus::Zapped),
        ]);

        let survivors = score.top_survivors(10);
        let ids: Vec<&str> = survivors.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["g002", "g003", "g001"]);

        let limited = score.top_survivors(1);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn records_sort_by_id() {
        let score = MutationScore::from_records(vec![
            record("g003", "a.py", "comparison", GremlinStatus::Zapped),
            record("g001", "a.py", "comparison", GremlinStatus::Zapped),
            record("g002", "a.py", "comparison", GremlinStatus::Zapped),
        ]);
        let ids: Vec<&str> = score.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["g001", "g002", "g003"]);
    }

    #[test]
    fn aggregator_counts_thread_safely() {
        use std::sync::Arc;

        let aggregator = Arc::new(ResultAggregator::new(100));
        let mut handles = Vec::new();
        for i in 0..4 {
            let agg = Arc::clone(&aggregator);
            handles.push(std::thread::spawn(move || {
                for j in 0..25 {
                    agg.add_result(WorkerResult::survived(
                        format!("g{:03}", i * 25 + j + 1),
                        None,
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(aggregator.progress(), (100, 100));
        let aggregator = Arc::try_unwrap(aggregator).ok().expect("sole owner");
        let results = aggregator.into_results();
        assert_eq!(results.len(), 100);
        assert_eq!(results[0].gremlin_id, "g001");
        assert_eq!(results[99].gremlin_id, "g100");
    }
}
