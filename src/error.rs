use std::path::PathBuf;

use thiserror::Error;

/// Infrastructure faults. Anything that reaches the caller as a `CrawlError`
/// abandons the current job; per-field and per-page misses never do.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("checkpoint encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("job `{name}` maps to `{stem}`, already used by job `{existing}`")]
    NameCollision {
        name: String,
        stem: String,
        existing: String,
    },

    #[error("browser: {0}")]
    Browser(String),
}

impl CrawlError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        CrawlError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;
