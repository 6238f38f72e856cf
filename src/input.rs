use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CrawlError, Result};
use crate::extract::listing::NO_SERVICES;
use crate::job::Target;

const LINK_COLUMNS: &[&str] = &["link", "Lien du Service"];
const LABEL_COLUMNS: &[&str] = &["category", "Catégorie"];
const TITLE_COLUMNS: &[&str] = &["title", "Titre du Service"];

fn read_without_bom(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| CrawlError::io(path, e))?;
    Ok(content.trim_start_matches('\u{feff}').to_string())
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

/// `label,url` rows after a header line. Short rows and rows with an empty
/// URL are skipped.
pub fn read_pairs(path: &Path) -> Result<Vec<Target>> {
    let content = read_without_bom(path)?;
    let mut targets = Vec::new();
    for record in reader(&content).records() {
        let record = record.map_err(|e| CrawlError::csv(path, e))?;
        match (record.get(0), record.get(1)) {
            (Some(label), Some(url)) if !url.is_empty() => {
                targets.push(Target::new(label, url));
            }
            _ => continue,
        }
    }
    Ok(targets)
}

/// Listing links from a listings output file, found by header name. Rows
/// standing in for an empty subcategory page are skipped.
pub fn read_links(path: &Path) -> Result<Vec<Target>> {
    let content = read_without_bom(path)?;
    let mut rdr = reader(&content);
    let headers = rdr.headers().map_err(|e| CrawlError::csv(path, e))?.clone();
    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h));

    let link_idx = find(LINK_COLUMNS).ok_or_else(|| CrawlError::MissingColumn {
        path: PathBuf::from(path),
        column: "link",
    })?;
    let label_idx = find(LABEL_COLUMNS);
    let title_idx = find(TITLE_COLUMNS);

    let mut targets = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| CrawlError::csv(path, e))?;
        let link = record.get(link_idx).unwrap_or_default();
        let placeholder = title_idx.and_then(|i| record.get(i)) == Some(NO_SERVICES);
        if link.is_empty() || placeholder {
            continue;
        }
        let label = label_idx
            .and_then(|i| record.get(i))
            .unwrap_or_default();
        targets.push(Target::new(label, link));
    }
    Ok(targets)
}

/// `*.csv` files in `dir` whose name starts with `prefix`, sorted by name.
pub fn csv_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| CrawlError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CrawlError::io(dir, e))?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv && name.starts_with(prefix) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
