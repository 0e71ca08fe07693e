//! Work items and batch partitioning.
//!
//! A work unit is one gremlin plus its ordered selected tests. Batches group
//! consecutive units from the same source file so one worker can amortize
//! runner start-up across them, re-setting the activation key per gremlin.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One gremlin to execute with its prioritized test filter.
///
/// Serializable because work items cross the process boundary to workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub gremlin_id: String,
    pub path: PathBuf,
    pub tests: Vec<String>,
}

/// A group of work units dispatched to one worker as a single item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub units: Vec<WorkUnit>,
}

impl Batch {
    /// Estimated cost: total selected tests, at least one per unit.
    pub fn weight(&self) -> usize {
        self.units.iter().map(|u| u.tests.len().max(1)).sum()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Split units into batches of at most `batch_size`, never spanning source
/// files. Input order is preserved, so partitioning is deterministic.
pub fn partition(units: Vec<WorkUnit>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches: Vec<Batch> = Vec::new();
    let mut current = Batch::default();

    for unit in units {
        let same_file = current
            .units
            .last()
            .map(|last| last.path == unit.path)
            .unwrap_or(true);
        if !same_file || current.len() >= batch_size {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
        }
        current.units.push(unit);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, path: &str, tests: usize) -> WorkUnit {
        WorkUnit {
            gremlin_id: id.to_string(),
            path: PathBuf::from(path),
            tests: (0..tests).map(|i| format!("tests/test.py::t{i}")).collect(),
        }
    }

    #[test]
    fn chunks_by_size() {
        let units = (1..=5).map(|i| unit(&format!("g00{i}"), "a.py", 1)).collect();
        let batches = partition(units, 2);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn batches_never_span_files() {
        let units = vec![
            unit("g001", "a.py", 1),
            unit("g002", "a.py", 1),
            unit("g003", "b.py", 1),
        ];
        let batches = partition(units, 10);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn order_within_batches_is_preserved() {
        let units = vec![unit("g001", "a.py", 1), unit("g002", "a.py", 1)];
        let batches = partition(units, 10);
        assert_eq!(batches[0].units[0].gremlin_id, "g001");
        assert_eq!(batches[0].units[1].gremlin_id, "g002");
    }

    #[test]
    fn weight_counts_tests_with_floor_of_one() {
        let batch = Batch {
            units: vec![unit("g001", "a.py", 3), unit("g002", "a.py", 0)],
        };
        assert_eq!(batch.weight(), 4);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let units = vec![unit("g001", "a.py", 1), unit("g002", "a.py", 1)];
        let batches = partition(units, 0);
        assert_eq!(batches.len(), 2);
    }
}
