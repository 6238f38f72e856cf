use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CrawlError, Result};

/// One URL to visit. Identity is the URL; the label travels with it into
/// the output rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub label: String,
    pub url: String,
}

impl Target {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Target {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// One resumable unit of work: an input file, its targets and where its
/// output, checkpoint and summary live.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub stem: String,
    pub targets: Vec<Target>,
    pub output: PathBuf,
    pub summary: PathBuf,
}

/// File-name-safe form of a job or category name: strips `\/*?:"<>|` and
/// turns spaces into underscores.
pub fn sanitize_name(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
    re.replace_all(name.trim(), "").replace(' ', "_")
}

/// Job name for an input file: its stem.
pub fn job_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Maps job names to on-disk stems for one stage run and refuses a second
/// job whose name sanitizes to a stem already in use.
#[derive(Debug, Default)]
pub struct JobRegistry {
    stems: HashMap<String, String>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, returning its stem. Registering the same name twice
    /// is fine; a different name landing on the same stem is not.
    pub fn register(&mut self, name: &str) -> Result<String> {
        let stem = sanitize_name(name);
        match self.stems.get(&stem) {
            Some(existing) if existing != name => Err(CrawlError::NameCollision {
                name: name.to_string(),
                stem,
                existing: existing.clone(),
            }),
            Some(_) => Ok(stem),
            None => {
                self.stems.insert(stem.clone(), name.to_string());
                Ok(stem)
            }
        }
    }
}
