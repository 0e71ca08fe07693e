use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Python source file within a project.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root (for example `src/auth.py`). This
    /// is the logical identifier used in gremlin records and coverage keys.
    pub root_relative: PathBuf,

    /// Absolute path on disk.
    pub absolute_path: PathBuf,
}

impl SourceFile {
    /// Construct a `SourceFile` from a project root and a relative path.
    pub fn from_relative(root: &Path, rel: &Path) -> Self {
        let absolute_path = root.join(rel);
        Self {
            root_relative: rel.to_path_buf(),
            absolute_path,
        }
    }

    /// Absolute path on disk.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    /// Path relative to the project root.
    pub fn relative_path(&self) -> &Path {
        &self.root_relative
    }

    /// Load the full file contents as UTF-8 text.
    pub fn read_to_string(&self) -> Result<String> {
        fs::read_to_string(&self.absolute_path)
            .with_context(|| format!("failed to read source file {:?}", self.absolute_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_root_and_relative() {
        let file = SourceFile::from_relative(Path::new("/proj"), Path::new("src/auth.py"));
        assert_eq!(file.path(), Path::new("/proj/src/auth.py"));
        assert_eq!(file.relative_path(), Path::new("src/auth.py"));
    }

    #[test]
    fn missing_file_read_is_an_error() {
        let file = SourceFile::from_relative(Path::new("/nonexistent"), Path::new("x.py"));
        assert!(file.read_to_string().is_err());
    }
}
