//! Source discovery and project scanning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use glob::Pattern;
use tracing::warn;
use walkdir::WalkDir;

use crate::finder::count_mutations;
use crate::operators::GremlinOperator;
use crate::source::SourceFile;
use crate::syntax::parse_module;

/// Directory name for persisted engine state under the project root.
pub const DEFAULT_CACHE_DIR: &str = ".gremlins-cache";

/// Find mutable Python sources under the configured target roots.
///
/// Defaults to `src` when present, otherwise the project root. Test files
/// (`test_*.py`, `*_test.py`, anything under a `tests` directory), hidden
/// directories, `__pycache__`, and the cache directory are skipped, then the
/// user's exclusion globs apply against root-relative paths. Results are
/// sorted, which makes gremlin id assignment reproducible across runs.
pub fn discover_sources(
    root: &Path,
    targets: &[PathBuf],
    exclude: &[String],
) -> Result<Vec<SourceFile>> {
    let patterns: Vec<Pattern> = exclude
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %raw, error = %e, "invalid exclusion glob, ignoring");
                None
            }
        })
        .collect();

    let targets: Vec<PathBuf> = if targets.is_empty() {
        if root.join("src").is_dir() {
            vec![PathBuf::from("src")]
        } else {
            vec![PathBuf::from(".")]
        }
    } else {
        targets.to_vec()
    };

    let mut found = Vec::new();
    for target in &targets {
        let base = root.join(target);
        if !base.exists() {
            warn!(target = %base.display(), "target path does not exist, skipping");
            continue;
        }
        for entry in WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to walk directory entry, skipping");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            if is_test_file(path) {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            let rel_str = rel.to_string_lossy();
            if patterns.iter().any(|p| p.matches(&rel_str)) {
                continue;
            }
            found.push(SourceFile::from_relative(root, &rel));
        }
    }

    found.sort_by(|a, b| a.root_relative.cmp(&b.root_relative));
    found.dedup_by(|a, b| a.root_relative == b.root_relative);
    Ok(found)
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    // Depth 0 is the walk root itself; it must never be filtered even when
    // its own name is dotted (temp dirs often are).
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    (name.starts_with('.') && name.len() > 1)
        || name == "__pycache__"
        || name == "tests"
        || name == "test"
}

fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("test_") || name.ends_with("_test.py") || name == "conftest.py" {
        return true;
    }
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("tests") | Some("test")
        )
    })
}

/// High-level overview of a project for the `scan` subcommand.
#[derive(Debug, Clone)]
pub struct ProjectOverview {
    /// Absolute path to the project root.
    pub root: PathBuf,

    /// Number of mutable source files found.
    pub source_files: usize,

    /// Files that failed to parse and were excluded.
    pub skipped_files: usize,

    /// Total source lines across parsed files.
    pub code_lines: usize,

    /// Total mutation points the enabled operators would produce.
    pub mutation_points: usize,

    /// Mutation point count per operator name.
    pub by_operator: BTreeMap<String, usize>,
}

/// Walk the project and count what a run would mutate, without running
/// anything.
pub fn scan_project(
    root: &Path,
    targets: &[PathBuf],
    exclude: &[String],
    operators: &[&dyn GremlinOperator],
) -> Result<ProjectOverview> {
    let sources = discover_sources(root, targets, exclude)?;

    let mut overview = ProjectOverview {
        root: root.to_path_buf(),
        source_files: sources.len(),
        skipped_files: 0,
        code_lines: 0,
        mutation_points: 0,
        by_operator: BTreeMap::new(),
    };

    for source in &sources {
        let text = match source.read_to_string() {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %source.relative_path().display(), error = %e, "unreadable source, skipping");
                overview.skipped_files += 1;
                continue;
            }
        };
        let module = match parse_module(&text) {
            Ok(module) => module,
            Err(e) => {
                warn!(file = %source.relative_path().display(), error = %e, "parse error, skipping");
                overview.skipped_files += 1;
                continue;
            }
        };

        overview.code_lines += text.lines().filter(|l| !l.trim().is_empty()).count();
        for op in operators {
            let count = count_mutations(&module, &[*op]);
            if count > 0 {
                *overview.by_operator.entry(op.name().to_string()).or_insert(0) += count;
            }
            overview.mutation_points += count;
        }
    }

    Ok(overview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::OperatorRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        write(root, "src/auth.py", "def is_adult(age): return age >= 18\n");
        write(root, "src/util.py", "def double(x): return x * 2\n");
        write(root, "src/vendor/skipme.py", "x = 1 > 0\n");
        write(root, "tests/test_auth.py", "def test_x(): assert True\n");
        write(root, "src/test_helpers.py", "HELPER = 1\n");
        write(root, "src/__pycache__/junk.py", "x = 1\n");
        dir
    }

    #[test]
    fn discovers_sources_not_tests() {
        let dir = fixture();
        let sources = discover_sources(dir.path(), &[], &[]).expect("discover");
        let rels: Vec<String> = sources
            .iter()
            .map(|s| s.relative_path().to_string_lossy().into_owned())
            .collect();

        assert!(rels.contains(&"src/auth.py".to_string()));
        assert!(rels.contains(&"src/util.py".to_string()));
        assert!(!rels.iter().any(|r| r.contains("test")));
        assert!(!rels.iter().any(|r| r.contains("__pycache__")));
    }

    #[test]
    fn exclusion_globs_apply() {
        let dir = fixture();
        let sources =
            discover_sources(dir.path(), &[], &["src/vendor/*".to_string()]).expect("discover");
        assert!(!sources
            .iter()
            .any(|s| s.relative_path().starts_with("src/vendor")));
    }

    #[test]
    fn results_are_sorted() {
        let dir = fixture();
        let sources = discover_sources(dir.path(), &[], &[]).expect("discover");
        let mut sorted = sources.clone();
        sorted.sort_by(|a, b| a.root_relative.cmp(&b.root_relative));
        assert_eq!(
            sources.iter().map(|s| &s.root_relative).collect::<Vec<_>>(),
            sorted.iter().map(|s| &s.root_relative).collect::<Vec<_>>()
        );
    }

    #[test]
    fn missing_target_warns_and_continues() {
        let dir = fixture();
        let sources = discover_sources(dir.path(), &[PathBuf::from("nope")], &[]).expect("discover");
        assert!(sources.is_empty());
    }

    #[test]
    fn scan_counts_mutation_points() {
        let dir = fixture();
        let registry = OperatorRegistry::builtin();
        let operators = registry.enabled(None);

        let overview = scan_project(dir.path(), &[], &[], &operators).expect("scan");
        assert_eq!(overview.skipped_files, 0);
        assert!(overview.mutation_points > 0);
        assert!(overview.by_operator.contains_key("comparison"));
    }

    #[test]
    fn scan_skips_unparseable_files() {
        let dir = fixture();
        write(dir.path(), "src/broken.py", "def broken(:\n");

        let registry = OperatorRegistry::builtin();
        let operators = registry.enabled(None);
        let overview = scan_project(dir.path(), &[], &[], &operators).expect("scan");
        assert_eq!(overview.skipped_files, 1);
    }
}

