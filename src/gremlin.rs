use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single mutation embedded in an instrumented module.
///
/// The id is assigned in deterministic traversal order and is unique within
/// a run; the original and mutated fragments are rendered source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gremlin {
    /// Stable identifier such as `g001`, dense from `g001` upward.
    pub id: String,

    /// Logical path of the source file containing the mutation.
    pub path: PathBuf,

    /// 1-based line of the original node.
    pub line: u32,

    /// Name of the operator that created this mutation.
    pub operator: String,

    /// Human-readable change, for example `>= to >`.
    pub description: String,

    /// Rendered original fragment.
    pub original: String,

    /// Rendered mutated fragment.
    pub mutated: String,
}

/// Immutable, ordered collection of every gremlin discovered in a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalogue {
    gremlins: Vec<Gremlin>,
    #[serde(skip)]
    by_id: BTreeMap<String, usize>,
    #[serde(skip)]
    by_path: BTreeMap<PathBuf, Vec<String>>,
}

impl Catalogue {
    pub fn from_gremlins(gremlins: Vec<Gremlin>) -> Self {
        let mut by_id = BTreeMap::new();
        let mut by_path: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for (i, g) in gremlins.iter().enumerate() {
            by_id.insert(g.id.clone(), i);
            by_path.entry(g.path.clone()).or_default().push(g.id.clone());
        }
        Self {
            gremlins,
            by_id,
            by_path,
        }
    }

    pub fn len(&self) -> usize {
        self.gremlins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gremlins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gremlin> {
        self.gremlins.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Gremlin> {
        self.by_id.get(id).map(|i| &self.gremlins[*i])
    }

    /// Gremlin ids for one source file, in discovery order.
    pub fn ids_for_path(&self, path: &Path) -> &[String] {
        self.by_path.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All source paths with at least one gremlin, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.by_path.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gremlin(id: &str, path: &str, line: u32) -> Gremlin {
        Gremlin {
            id: id.to_string(),
            path: PathBuf::from(path),
            line,
            operator: "comparison".to_string(),
            description: ">= to >".to_string(),
            original: "age >= 18".to_string(),
            mutated: "age > 18".to_string(),
        }
    }

    #[test]
    fn lookup_by_id_and_path() {
        let catalogue = Catalogue::from_gremlins(vec![
            gremlin("g001", "src/a.py", 1),
            gremlin("g002", "src/b.py", 3),
            gremlin("g003", "src/a.py", 7),
        ]);

        assert_eq!(catalogue.len(), 3);
        assert_eq!(catalogue.get("g002").unwrap().line, 3);
        assert!(catalogue.get("g999").is_none());
        assert_eq!(
            catalogue.ids_for_path(Path::new("src/a.py")),
            &["g001".to_string(), "g003".to_string()]
        );
        assert!(catalogue.ids_for_path(Path::new("src/c.py")).is_empty());
    }

    #[test]
    fn paths_are_sorted() {
        let catalogue = Catalogue::from_gremlins(vec![
            gremlin("g001", "src/z.py", 1),
            gremlin("g002", "src/a.py", 1),
        ]);
        let paths: Vec<&PathBuf> = catalogue.paths().collect();
        assert_eq!(paths[0], &PathBuf::from("src/a.py"));
        assert_eq!(paths[1], &PathBuf::from("src/z.py"));
    }
}
