//! Coverage map: which tests execute which source lines.
//!
//! Built from one coverage-instrumented pass of the host test runner. The
//! runner emits a JSON document mapping each test id to the `(path, line)`
//! pairs it executed; the inverted index here answers "who can observe a
//! mutation at this location".

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// On-disk shape of the runner's coverage output and of the cached snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageData {
    /// Test id to covered lines per file.
    pub tests: BTreeMap<String, BTreeMap<String, Vec<u32>>>,
}

impl CoverageData {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read coverage data {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse coverage data {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize coverage data")?;
        fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
        Ok(())
    }
}

/// Inverted index from source location to the tests covering it.
#[derive(Debug, Clone, Default)]
pub struct CoverageMap {
    data: BTreeMap<(PathBuf, u32), BTreeSet<String>>,
    recorded_tests: BTreeSet<String>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: &CoverageData) -> Self {
        let mut map = Self::new();
        for (test, files) in &data.tests {
            map.recorded_tests.insert(test.clone());
            for (file, lines) in files {
                for line in lines {
                    map.add(PathBuf::from(file), *line, test.clone());
                }
            }
        }
        map
    }

    pub fn add(&mut self, path: PathBuf, line: u32, test: String) {
        self.data.entry((path, line)).or_default().insert(test);
    }

    /// Tests covering one location; empty when the location was never hit.
    pub fn tests_for(&self, path: &Path, line: u32) -> BTreeSet<String> {
        self.data
            .get(&(path.to_path_buf(), line))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, path: &Path, line: u32) -> bool {
        self.data.contains_key(&(path.to_path_buf(), line))
    }

    /// Number of distinct locations with coverage.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Tests that appeared in the coverage pass.
    pub fn recorded_tests(&self) -> &BTreeSet<String> {
        &self.recorded_tests
    }

    pub fn locations(&self) -> impl Iterator<Item = (&PathBuf, u32)> {
        self.data.iter().map(|((path, line), _)| (path, *line))
    }

    /// Locations touched by at least `threshold` tests, most-covered first.
    ///
    /// Heavily covered lines are usually setup or utility code; surfacing
    /// them helps explain why some gremlins select many tests.
    pub fn incidentally_tested(&self, threshold: usize) -> Vec<(PathBuf, u32, usize)> {
        let mut results: Vec<(PathBuf, u32, usize)> = self
            .data
            .iter()
            .filter(|(_, tests)| tests.len() >= threshold)
            .map(|((path, line), tests)| (path.clone(), *line, tests.len()))
            .collect();
        results.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (&a.0, a.1).cmp(&(&b.0, b.1))));
        results
    }
}
