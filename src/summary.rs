use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::Local;

use crate::error::{CrawlError, Result};
use crate::extract::{Extraction, Status};

/// Per-job counters, rendered to `Stats_{stem}.txt` once the job is done.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub job: String,
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub rows: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl JobSummary {
    pub fn new(job: impl Into<String>) -> Self {
        JobSummary {
            job: job.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, extraction: &Extraction) {
        self.total += 1;
        self.rows += extraction.rows.len();
        match extraction.status {
            Status::Success => self.success += 1,
            Status::Error => self.errors += 1,
        }
        for (key, count) in &extraction.categories {
            *self.by_category.entry(key.clone()).or_default() += count;
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "REPORT - {}", self.job);
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Finished at   : {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Total visited : {}", self.total);
        let _ = writeln!(out, "Success       : {}", self.success);
        let _ = writeln!(out, "Errors        : {}", self.errors);
        let _ = writeln!(out, "Rows written  : {}", self.rows);
        let _ = writeln!(out);
        let _ = writeln!(out, "BY CATEGORY:");
        for (key, count) in &self.by_category {
            let _ = writeln!(out, "- {} : {}", key, count);
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| CrawlError::io(dir, e))?;
        }
        fs::write(path, self.render()).map_err(|e| CrawlError::io(path, e))
    }
}

/// Totals across every job of one stage run, updated per visited target so
/// an interrupted run still reports what reached disk.
#[derive(Debug, Default)]
pub struct StageReport {
    pub jobs: usize,
    pub failed_jobs: usize,
    pub visited: usize,
    pub errors: usize,
    pub rows: usize,
}

impl StageReport {
    pub fn record(&mut self, extraction: &Extraction) {
        self.visited += 1;
        self.rows += extraction.rows.len();
        if !extraction.is_success() {
            self.errors += 1;
        }
    }

    pub fn finish_job(&mut self) {
        self.jobs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(category: &str, rows: usize) -> Extraction {
        Extraction {
            status: Status::Success,
            rows: vec![vec!["x".to_string()]; rows],
            categories: vec![(category.to_string(), 1)],
        }
    }

    #[test]
    fn counts_and_breakdown() {
        let mut s = JobSummary::new("Results_Design");
        s.record(&ok("Design > Logo", 1));
        s.record(&ok("Design > Logo", 1));
        s.record(&ok("Design > Banner", 1));
        s.record(&Extraction::failed(vec!["error".to_string()]));

        assert_eq!(s.total, 4);
        assert_eq!(s.success, 3);
        assert_eq!(s.errors, 1);
        assert_eq!(s.rows, 4);
        assert_eq!(s.by_category["Design > Logo"], 2);
        assert_eq!(s.by_category[crate::extract::ERROR_BUCKET], 1);

        let text = s.render();
        assert!(text.starts_with("REPORT - Results_Design\n"));
        assert!(text.contains("Total visited : 4\n"));
        assert!(text.contains("Errors        : 1\n"));
        // keys are sorted
        let banner = text.find("- Design > Banner : 1").unwrap();
        let logo = text.find("- Design > Logo : 2").unwrap();
        assert!(banner < logo);
    }

    #[test]
    fn write_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("details/Stats_x.txt");
        JobSummary::new("x").write(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("Success       : 0"));
    }

    #[test]
    fn stage_report_accumulates() {
        let mut report = StageReport::default();
        report.record(&ok("c", 3));
        report.finish_job();
        report.record(&Extraction::failed(vec![]));
        report.finish_job();
        assert_eq!(report.jobs, 2);
        assert_eq!(report.visited, 2);
        assert_eq!(report.errors, 1);
        // the error row counts too
        assert_eq!(report.rows, 4);
    }
}
