pub mod detail;
pub mod listing;
pub mod locators;

use async_trait::async_trait;

use crate::job::Target;
use crate::reader::PageReader;

pub use detail::DetailExtractor;
pub use listing::ListingExtractor;

/// Tally bucket for targets whose extraction failed.
pub const ERROR_BUCKET: &str = "errors > broken links";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
}

/// Outcome of visiting one target: the rows to append and the category
/// tallies they contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub status: Status,
    pub rows: Vec<Vec<String>>,
    pub categories: Vec<(String, usize)>,
}

impl Extraction {
    /// A single all-sentinel row standing in for a target that could not be
    /// read.
    pub fn failed(row: Vec<String>) -> Self {
        Extraction {
            status: Status::Error,
            rows: vec![row],
            categories: vec![(ERROR_BUCKET.to_string(), 1)],
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Per-stage page extraction. Never fails: problems come back as an
/// `Extraction` with `Status::Error`.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn header(&self) -> &'static [&'static str];

    async fn extract(&self, reader: &mut dyn PageReader, target: &Target) -> Extraction;
}
