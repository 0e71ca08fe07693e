//! Incremental result cache.
//!
//! Outcomes are keyed by `{gremlin-id}:{source-hash}:{combined-test-hash}`,
//! so invalidation is a property of key construction: touching the source
//! file or any covering test file produces a different key and a guaranteed
//! miss. Nothing is ever deleted on invalidation; stale keys just stop being
//! asked for.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hasher::ContentHasher;
use crate::results::GremlinStatus;
use crate::store::ResultStore;

/// Sentinel combined hash for gremlins with no covering test files.
const NO_TESTS: &str = "no_tests";

/// Cached outcome for one (gremlin, code-state, test-state) triple.
///
/// Execution time is ephemeral and deliberately not cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedOutcome {
    pub status: GremlinStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killing_test: Option<String>,
}

/// Running hit/miss counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Coordinator tying content hashes to the persistent store.
pub struct IncrementalCache {
    store: ResultStore,
    hasher: ContentHasher,
    stats: CacheStats,
}

impl IncrementalCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            store: ResultStore::open(db_path)?,
            hasher: ContentHasher::new(),
            stats: CacheStats::default(),
        })
    }

    /// Build the cache key for a gremlin given the current content hashes.
    ///
    /// `test_file_hashes` maps covering test files to their digests; files
    /// combine in sorted path order so selection order cannot perturb keys.
    pub fn build_key(
        &self,
        gremlin_id: &str,
        source_hash: &str,
        test_file_hashes: &BTreeMap<String, String>,
    ) -> String {
        let combined = if test_file_hashes.is_empty() {
            NO_TESTS.to_string()
        } else {
            // BTreeMap iteration is already path-sorted.
            let hashes: Vec<String> = test_file_hashes.values().cloned().collect();
            self.hasher.hash_combined(&hashes)
        };
        format!("{gremlin_id}:{source_hash}:{combined}")
    }

    /// Look up a prior outcome; counts a hit or miss.
    pub fn get(
        &mut self,
        gremlin_id: &str,
        source_hash: &str,
        test_file_hashes: &BTreeMap<String, String>,
    ) -> Option<CachedOutcome> {
        let key = self.build_key(gremlin_id, source_hash, test_file_hashes);
        let outcome = self
            .store
            .get(&key)
            .and_then(|payload| match serde_json::from_str(payload) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(%key, error = %e, "undecodable cache entry, treating as miss");
                    None
                }
            });

        if outcome.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        outcome
    }

    /// Queue an outcome for persistence; durable after `flush`.
    pub fn put_deferred(
        &mut self,
        gremlin_id: &str,
        source_hash: &str,
        test_file_hashes: &BTreeMap<String, String>,
        outcome: &CachedOutcome,
    ) {
        let key = self.build_key(gremlin_id, source_hash, test_file_hashes);
        match serde_json::to_string(outcome) {
            Ok(payload) => self.store.put_deferred(key, payload),
            Err(e) => warn!(%key, error = %e, "failed to serialize outcome, not caching"),
        }
    }

    /// Flush queued writes; warn and retry once, then proceed uncached.
    pub fn flush(&mut self) {
        if let Err(first) = self.store.flush() {
            warn!(error = %first, "cache flush failed, retrying once");
            if let Err(second) = self.store.flush() {
                warn!(error = %second, "cache flush failed again, results not cached");
            }
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        self.stats = CacheStats::default();
        self.store.clear()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn entry_count(&self) -> usize {
        self.store.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hashes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn open_cache(dir: &TempDir) -> IncrementalCache {
        IncrementalCache::open(&dir.path().join("results.db")).expect("open cache")
    }

    #[test]
    fn key_embeds_all_three_parts() {
        let dir = TempDir::new().expect("tempdir");
        let cache = open_cache(&dir);

        let key = cache.build_key("g001", "srchash", &hashes(&[("tests/test_a.py", "aaa")]));
        assert!(key.starts_with("g001:srchash:"));

        let no_tests = cache.build_key("g001", "srchash", &BTreeMap::new());
        assert_eq!(no_tests, "g001:srchash:no_tests");
    }

    #[test]
    fn key_is_stable_under_test_insertion_order() {
        let dir = TempDir::new().expect("tempdir");
        let cache = open_cache(&dir);

        let mut forward = BTreeMap::new();
        forward.insert("tests/test_a.py".to_string(), "aaa".to_string());
        forward.insert("tests/test_b.py".to_string(), "bbb".to_string());

        let mut reverse = BTreeMap::new();
        reverse.insert("tests/test_b.py".to_string(), "bbb".to_string());
        reverse.insert("tests/test_a.py".to_string(), "aaa".to_string());

        assert_eq!(
            cache.build_key("g001", "s", &forward),
            cache.build_key("g001", "s", &reverse)
        );
    }

    #[test]
    fn changed_source_hash_misses() {
        let dir = TempDir::new().expect("tempdir");
        let mut cache = open_cache(&dir);
        let tests = hashes(&[("tests/test_a.py", "aaa")]);

        let outcome = CachedOutcome {
            status: GremlinStatus::Zapped,
            killing_test: Some("tests/test_a.py::test_x".to_string()),
        };
        cache.put_deferred("g001", "hash1", &tests, &outcome);
        cache.flush();

        assert_eq!(cache.get("g001", "hash1", &tests), Some(outcome));
        assert_eq!(cache.get("g001", "hash2", &tests), None);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn changed_test_hash_misses() {
        let dir = TempDir::new().expect("tempdir");
        let mut cache = open_cache(&dir);

        let outcome = CachedOutcome {
            status: GremlinStatus::Survived,
            killing_test: None,
        };
        cache.put_deferred("g001", "s", &hashes(&[("tests/test_a.py", "v1")]), &outcome);
        cache.flush();

        assert!(cache
            .get("g001", "s", &hashes(&[("tests/test_a.py", "v2")]))
            .is_none());
        assert!(cache
            .get(
                "g001",
                "s",
                &hashes(&[("tests/test_a.py", "v1"), ("tests/test_b.py", "v1")])
            )
            .is_none());
    }

    #[test]
    fn outcomes_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let tests = hashes(&[("tests/test_a.py", "aaa")]);
        let outcome = CachedOutcome {
            status: GremlinStatus::Timeout,
            killing_test: None,
        };

        {
            let mut cache = open_cache(&dir);
            cache.put_deferred("g007", "s", &tests, &outcome);
            cache.flush();
        }

        let mut cache = open_cache(&dir);
        assert_eq!(cache.get("g007", "s", &tests), Some(outcome));
    }

    #[test]
    fn clear_removes_everything() {
        let dir = TempDir::new().expect("tempdir");
        let mut cache = open_cache(&dir);
        let tests = BTreeMap::new();

        cache.put_deferred(
            "g001",
            "s",
            &tests,
            &CachedOutcome {
                status: GremlinStatus::Survived,
                killing_test: None,
            },
        );
        cache.flush();
        assert_eq!(cache.entry_count(), 1);

        cache.clear().expect("clear");
        assert_eq!(cache.entry_count(), 0);
        assert!(cache.get("g001", "s", &tests).is_none());
    }
}
