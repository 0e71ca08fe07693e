//! Persistent result store.
//!
//! A single-writer, append-only key-value file. The first line is a magic
//! header identifying the format; every record line carries the SHA-256 of
//! its payload so torn writes and corruption are detected on open. Replay is
//! last-write-wins, which makes re-running a key a plain append.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

const MAGIC: &str = "gremlins-results v1";

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
}

/// Key-value store backing the incremental cache.
pub struct ResultStore {
    path: PathBuf,
    lock_path: PathBuf,
    entries: BTreeMap<String, String>,
    pending: Vec<(String, String)>,
}

impl ResultStore {
    /// Open or create the store at `path`.
    ///
    /// A failed consistency check deletes and recreates the file with a
    /// warning; opening never fails because of corruption. A second writer
    /// is refused via a lock file next to the store.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache dir {:?}", parent))?;
        }

        let lock_path = lock_path_for(path);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                bail!(
                    "result store {:?} is locked by another process (stale lock? remove {:?})",
                    path,
                    lock_path
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create lock {:?}", lock_path))
            }
        }

        let entries = match load_entries(path) {
            Ok(entries) => entries,
            Err(reason) => {
                warn!(path = %path.display(), %reason, "result store failed consistency check, recreating");
                fs::remove_file(path).ok();
                BTreeMap::new()
            }
        };

        if !path.exists() {
            fs::write(path, format!("{MAGIC}\n"))
                .with_context(|| format!("failed to create result store {:?}", path))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_path,
            entries,
            pending: Vec::new(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Store a value and make it durable immediately.
    pub fn put(&mut self, key: String, value: String) -> Result<()> {
        self.append_lines(&[(key.clone(), value.clone())])?;
        self.entries.insert(key, value);
        Ok(())
    }

    /// Queue a write; durable only after `flush`.
    pub fn put_deferred(&mut self, key: String, value: String) {
        self.entries.insert(key.clone(), value.clone());
        self.pending.push((key, value));
    }

    /// Append all queued writes in one pass.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        if let Err(e) = self.append_lines(&pending) {
            // Put them back so a retrying caller does not lose writes.
            self.pending = pending;
            return Err(e);
        }
        Ok(())
    }

    /// Drop every entry and truncate the file to its header.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.pending.clear();
        fs::write(&self.path, format!("{MAGIC}\n"))
            .with_context(|| format!("failed to clear result store {:?}", self.path))?;
        Ok(())
    }

    fn append_lines(&self, records: &[(String, String)]) -> Result<()> {
        let mut out = String::new();
        for (key, value) in records {
            let record = Record {
                key: key.clone(),
                value: value.clone(),
            };
            let payload = serde_json::to_string(&record).context("serialize store record")?;
            let digest = Sha256::digest(payload.as_bytes());
            out.push_str(&format!("{digest:x}  {payload}\n"));
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("failed to open result store {:?}", self.path))?;
        file.write_all(out.as_bytes())
            .with_context(|| format!("failed to append to result store {:?}", self.path))?;
        file.sync_all().ok();
        Ok(())
    }
}

impl Drop for ResultStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush result store on close");
        }
        fs::remove_file(&self.lock_path).ok();
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results.db".to_string());
    name.push_str(".lock");
    path.with_file_name(name)
}

fn load_entries(path: &Path) -> std::result::Result<BTreeMap<String, String>, String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(format!("unreadable: {e}")),
    };

    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header == MAGIC => {}
        Some(other) => return Err(format!("bad header {other:?}")),
        None => return Err("empty file".to_string()),
    }

    let mut entries = BTreeMap::new();
    for (lineno, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        let Some((checksum, payload)) = line.split_once("  ") else {
            return Err(format!("malformed record on line {}", lineno + 2));
        };
        let digest = Sha256::digest(payload.as_bytes());
        if format!("{digest:x}") != checksum {
            return Err(format!("checksum mismatch on line {}", lineno + 2));
        }
        let record: Record = serde_json::from_str(payload)
            .map_err(|e| format!("bad record json on line {}: {e}", lineno + 2))?;
        entries.insert(record.key, record.value);
    }
    Ok(entries)
}
