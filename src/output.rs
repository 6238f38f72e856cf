use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CrawlError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Append-only CSV sink for one job. The file is created with a BOM and the
/// header the first time; later runs only append.
pub struct OutputStore {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl OutputStore {
    pub fn open(path: &Path, header: &[&str]) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| CrawlError::io(dir, e))?;
        }

        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CrawlError::io(path, e))?;
        if is_new {
            file.write_all(UTF8_BOM).map_err(|e| CrawlError::io(path, e))?;
        }

        let mut store = OutputStore {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file),
        };
        if is_new {
            store.append(&[header.iter().map(|h| h.to_string()).collect()])?;
        }
        Ok(store)
    }

    /// Write `rows` and flush before returning.
    pub fn append(&mut self, rows: &[Vec<String>]) -> Result<()> {
        for row in rows {
            self.writer
                .write_record(row)
                .map_err(|e| CrawlError::csv(&self.path, e))?;
        }
        self.writer
            .flush()
            .map_err(|e| CrawlError::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Overwrite `path` with a BOM, `header` and `rows`.
pub fn write_table(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| CrawlError::io(path, e))?;
    }
    OutputStore::open(path, header)?.append(rows)
}
