//! Coverage-guided test selection with specificity ordering.
//!
//! For each gremlin only the tests that execute its source line are worth
//! running. They are ordered narrowest-first: a test covering few lines is
//! more likely to fail fast under a mutation at one of them, and the runner
//! stops at the first failure.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::coverage::CoverageMap;
use crate::gremlin::Gremlin;

/// Extract the test file from a `path::testname` style test id.
pub fn test_file_of(test_id: &str) -> Option<&str> {
    test_id.split("::").next().filter(|p| !p.is_empty())
}

/// Selects and prioritizes covering tests for gremlin locations.
pub struct TestSelector {
    map: CoverageMap,
    /// Tests the runner can currently enumerate.
    known_tests: BTreeSet<String>,
    /// Enumerable tests absent from the coverage pass. Coverage may be stale
    /// or never attached for them, so they are treated as covering
    /// everything: extra work, never a missed killer.
    unrecorded: BTreeSet<String>,
    /// Lines covered per test; lower is more specific.
    specificity: BTreeMap<String, usize>,
}

impl TestSelector {
    pub fn new(map: CoverageMap, known_tests: Vec<String>) -> Self {
        let known: BTreeSet<String> = known_tests.into_iter().collect();
        let unrecorded: BTreeSet<String> = known
            .iter()
            .filter(|t| !map.recorded_tests().contains(*t))
            .cloned()
            .collect();

        let mut specificity: BTreeMap<String, usize> = BTreeMap::new();
        for (path, line) in map.locations() {
            for test in map.tests_for(path, line) {
                *specificity.entry(test).or_insert(0) += 1;
            }
        }

        Self {
            map,
            known_tests: known,
            unrecorded,
            specificity,
        }
    }

    /// Lines covered by a test; unrecorded tests rank as broadest possible.
    pub fn specificity_of(&self, test: &str) -> usize {
        if self.unrecorded.contains(test) {
            return usize::MAX;
        }
        self.specificity.get(test).copied().unwrap_or(usize::MAX)
    }

    /// Ordered tests able to observe a mutation at `(path, line)`.
    ///
    /// The covering set is intersected with the enumerable test set, then
    /// unrecorded tests are appended as a safe over-approximation. Sorted by
    /// ascending specificity, ties broken by test id. An empty return means
    /// the location is uncovered.
    pub fn select_for_location(&self, path: &Path, line: u32) -> Vec<String> {
        let mut selected: Vec<String> = self
            .map
            .tests_for(path, line)
            .into_iter()
            .filter(|t| self.known_tests.contains(t))
            .collect();
        selected.extend(self.unrecorded.iter().cloned());

        selected.sort_by(|a, b| {
            self.specificity_of(a)
                .cmp(&self.specificity_of(b))
                .then_with(|| a.cmp(b))
        });
        selected.dedup();
        selected
    }

    pub fn select_for_gremlin(&self, gremlin: &Gremlin) -> Vec<String> {
        self.select_for_location(&gremlin.path, gremlin.line)
    }

    /// Distinct test files behind a selection, sorted. Feeds the cache key.
    pub fn test_files_for<'a>(&self, selected: &'a [String]) -> Vec<&'a str> {
        let mut files: Vec<&str> = selected.iter().filter_map(|t| test_file_of(t)).collect();
        files.sort_unstable();
        files.dedup();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageData;
    use std::path::PathBuf;

    fn selector() -> TestSelector {
        let json = r#"{
            "tests": {
                "tests/test_auth.py::test_broad": {
                    "src/auth.py": [10, 11, 12, 42],
                    "src/session.py": [1, 2, 3]
                },
                "tests/test_auth.py::test_narrow": {
                    "src/auth.py": [42]
                }
            }
        }"#;
        let data: CoverageData = serde_json::from_str(json).expect("parse");
        let map = CoverageMap::from_data(&data);
        TestSelector::new(
            map,
            vec![
                "tests/test_auth.py::test_broad".to_string(),
                "tests/test_auth.py::test_narrow".to_string(),
            ],
        )
    }

    #[test]
    fn narrow_test_is_selected_first() {
        let s = selector();
        let selected = s.select_for_location(Path::new("src/auth.py"), 42);
        assert_eq!(
            selected,
            vec![
                "tests/test_auth.py::test_narrow".to_string(),
                "tests/test_auth.py::test_broad".to_string(),
            ]
        );
    }

    #[test]
    fn uncovered_location_selects_nothing() {
        let s = selector();
        assert!(s.select_for_location(Path::new("src/auth.py"), 999).is_empty());
    }

    #[test]
    fn covered_tests_are_never_skipped() {
        let s = selector();
        let selected = s.select_for_location(Path::new("src/auth.py"), 10);
        assert!(selected.contains(&"tests/test_auth.py::test_broad".to_string()));
    }

    #[test]
    fn vanished_tests_are_dropped_from_selection() {
        let json = r#"{
            "tests": {
                "tests/test_old.py::test_gone": { "src/auth.py": [42] }
            }
        }"#;
        let data: CoverageData = serde_json::from_str(json).expect("parse");
        let map = CoverageMap::from_data(&data);
        let s = TestSelector::new(map, Vec::new());
        assert!(s.select_for_location(Path::new("src/auth.py"), 42).is_empty());
    }

    #[test]
    fn unrecorded_test_is_selected_everywhere_but_last() {
        let json = r#"{
            "tests": {
                "tests/test_auth.py::test_narrow": { "src/auth.py": [42] }
            }
        }"#;
        let data: CoverageData = serde_json::from_str(json).expect("parse");
        let map = CoverageMap::from_data(&data);
        let s = TestSelector::new(
            map,
            vec![
                "tests/test_auth.py::test_narrow".to_string(),
                "tests/test_new.py::test_added_later".to_string(),
            ],
        );

        let selected = s.select_for_location(Path::new("src/auth.py"), 42);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1], "tests/test_new.py::test_added_later");

        // The unrecorded test also shows up for locations with no coverage.
        let selected = s.select_for_location(Path::new("src/other.py"), 1);
        assert_eq!(selected, vec!["tests/test_new.py::test_added_later".to_string()]);
    }

    #[test]
    fn specificity_counts_total_lines() {
        let s = selector();
        assert_eq!(s.specificity_of("tests/test_auth.py::test_narrow"), 1);
        assert_eq!(s.specificity_of("tests/test_auth.py::test_broad"), 7);
    }

    #[test]
    fn test_files_are_deduped_and_sorted() {
        let s = selector();
        let selected = vec![
            "tests/test_b.py::test_one".to_string(),
            "tests/test_a.py::test_two".to_string(),
            "tests/test_b.py::test_three".to_string(),
        ];
        assert_eq!(
            s.test_files_for(&selected),
            vec!["tests/test_a.py", "tests/test_b.py"]
        );
    }

    #[test]
    fn gremlin_selection_uses_its_location() {
        let s = selector();
        let gremlin = Gremlin {
            id: "g001".to_string(),
            path: PathBuf::from("src/auth.py"),
            line: 42,
            operator: "comparison".to_string(),
            description: ">= to >".to_string(),
            original: String::new(),
            mutated: String::new(),
        };
        assert_eq!(s.select_for_gremlin(&gremlin).len(), 2);
    }
}
