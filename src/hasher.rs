use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Content hasher for incremental-cache keys.
///
/// Hashes are SHA-256 over line-ending-normalized UTF-8 text, so a file keeps
/// its identity across CRLF/LF checkouts. Digests are 64 lowercase hex chars.
#[derive(Debug, Default, Clone)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a string after normalizing CRLF line endings to LF.
    pub fn hash_str(&self, content: &str) -> String {
        let normalized = content.replace("\r\n", "\n");
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{digest:x}")
    }

    /// Hash a file's UTF-8 contents.
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {:?} for hashing", path))?;
        Ok(self.hash_str(&content))
    }

    /// Combine multiple digests into a single composite digest.
    ///
    /// Sub-hashes are joined with a single `:` separator byte before
    /// re-hashing, so `["ab", "c"]` and `["a", "bc"]` combine differently.
    pub fn hash_combined(&self, hashes: &[String]) -> String {
        let combined = hashes.join(":");
        let digest = Sha256::digest(combined.as_bytes());
        format!("{digest:x}")
    }
}
