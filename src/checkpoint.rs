use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{CrawlError, Result};

/// One JSON array of completed URLs per job, in a directory of its own.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CheckpointStore { dir: dir.into() }
    }

    pub fn path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("progress_{}.json", stem))
    }

    /// Completed URLs for `stem`. Missing or unreadable checkpoints load as
    /// an empty set.
    pub fn load(&self, stem: &str) -> HashSet<String> {
        let path = self.path(stem);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No checkpoint for {}, starting fresh", stem);
                return HashSet::new();
            }
            Err(e) => {
                warn!("Unreadable checkpoint {}: {}. Starting fresh.", path.display(), e);
                return HashSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(urls) => urls.into_iter().collect(),
            Err(e) => {
                warn!("Malformed checkpoint {}: {}. Starting fresh.", path.display(), e);
                HashSet::new()
            }
        }
    }

    /// Replace the checkpoint for `stem` with the full `completed` set.
    pub fn save(&self, stem: &str, completed: &HashSet<String>) -> Result<()> {
        let mut urls: Vec<&String> = completed.iter().collect();
        urls.sort();
        let json = serde_json::to_string_pretty(&urls)?;
        atomic_write(&self.path(stem), json.as_bytes())
    }

    pub fn remove(&self, stem: &str) -> Result<bool> {
        let path = self.path(stem);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CrawlError::io(path, e)),
        }
    }
}

/// Write through a temp file in the target directory, then rename over the
/// target. Readers see either the old or the new content.
fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CrawlError::io(dir, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| CrawlError::io(dir, e))?;
    let written = temp.write_all(contents);
    let synced = written.and_then(|_| temp.as_file_mut().sync_all());
    synced.map_err(|e| CrawlError::io(path, e))?;
    temp.persist(path)
        .map_err(|e| CrawlError::io(path, e.error))?;
    Ok(())
}
