use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::locators::DetailLocators;
use super::{Extraction, Extractor, Status};
use crate::error::Result;
use crate::job::Target;
use crate::reader::{Locator, PageReader};
use crate::settings::StageSettings;

pub const HEADER: &[&str] = &[
    "title",
    "owner",
    "buyers",
    "votes",
    "last_review_date",
    "category",
    "subcategory",
    "keywords",
    "link",
];

pub const NOT_FOUND: &str = "not found";
pub const NO_REVIEWS: &str = "no reviews";
pub const UNKNOWN: &str = "unknown";
pub const NO_TAGS: &str = "no tags";
pub const TAGS_ERROR: &str = "tags error";
pub const ERROR: &str = "error";
pub const ERROR_COUNT: &str = "0";

/// Fields of one service page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDetail {
    pub title: String,
    pub owner: String,
    pub buyers: String,
    pub votes: String,
    pub last_review: String,
    pub category: String,
    pub subcategory: String,
    pub keywords: String,
    pub link: String,
}

impl ServiceDetail {
    /// Every field set to its error sentinel; only the link survives.
    pub fn failed(link: &str) -> Self {
        ServiceDetail {
            title: ERROR.to_string(),
            owner: ERROR.to_string(),
            buyers: ERROR_COUNT.to_string(),
            votes: ERROR_COUNT.to_string(),
            last_review: ERROR_COUNT.to_string(),
            category: ERROR.to_string(),
            subcategory: ERROR.to_string(),
            keywords: ERROR.to_string(),
            link: link.to_string(),
        }
    }

    pub fn into_row(self) -> Vec<String> {
        vec![
            self.title,
            self.owner,
            self.buyers,
            self.votes,
            self.last_review,
            self.category,
            self.subcategory,
            self.keywords,
            self.link,
        ]
    }
}

pub struct DetailExtractor {
    locators: DetailLocators,
    timing: StageSettings,
}

impl DetailExtractor {
    pub fn new(locators: DetailLocators, timing: StageSettings) -> Self {
        DetailExtractor { locators, timing }
    }

    async fn field(
        &self,
        reader: &mut dyn PageReader,
        locator: &Locator,
        default: &str,
        wait: Duration,
    ) -> Result<String> {
        // a present element keeps its text even when empty
        Ok(reader
            .read(locator, wait)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    async fn try_extract(&self, reader: &mut dyn PageReader, target: &Target) -> Result<ServiceDetail> {
        reader.navigate(&target.url).await?;
        tokio::time::sleep(self.timing.settle()).await;

        let loc = &self.locators;
        let wait = self.timing.wait();
        let title = self.field(reader, &loc.title, NOT_FOUND, wait).await?;
        let owner = self.field(reader, &loc.owner, NOT_FOUND, wait).await?;
        let buyers = self.field(reader, &loc.buyers, NOT_FOUND, wait).await?;
        let votes = self
            .field(reader, &loc.votes, NOT_FOUND, wait)
            .await?
            .replace(['(', ')'], "");
        let last_review = self.field(reader, &loc.last_review, NO_REVIEWS, wait).await?;

        let keywords = match reader.read_all(&loc.tags).await {
            Ok(tags) if tags.is_empty() => NO_TAGS.to_string(),
            Ok(tags) => tags.join(", "),
            Err(e) => {
                warn!("   Tags unreadable on {}: {}", target.url, e);
                TAGS_ERROR.to_string()
            }
        };

        let category = self.field(reader, &loc.category, UNKNOWN, wait).await?;
        let subcategory = self.field(reader, &loc.subcategory, UNKNOWN, wait).await?;

        Ok(ServiceDetail {
            title,
            owner,
            buyers,
            votes,
            last_review,
            category,
            subcategory,
            keywords,
            link: target.url.clone(),
        })
    }
}

#[async_trait]
impl Extractor for DetailExtractor {
    fn header(&self) -> &'static [&'static str] {
        HEADER
    }

    async fn extract(&self, reader: &mut dyn PageReader, target: &Target) -> Extraction {
        match self.try_extract(reader, target).await {
            Ok(detail) => {
                let preview: String = detail.keywords.chars().take(50).collect();
                info!("   OK | Tags: {}...", preview);
                let key = format!("{} > {}", detail.category, detail.subcategory);
                Extraction {
                    status: Status::Success,
                    rows: vec![detail.into_row()],
                    categories: vec![(key, 1)],
                }
            }
            Err(e) => {
                warn!("   Detail extraction failed for {}: {}", target.url, e);
                Extraction::failed(ServiceDetail::failed(&target.url).into_row())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ERROR_BUCKET;
    use crate::reader::fake::{FakePage, FakeReader};

    const URL: &str = "https://khamsat.com/service/42";

    fn timing() -> StageSettings {
        StageSettings {
            pause_ms: 0,
            settle_ms: 0,
            wait_ms: 0,
            max_load_more: 0,
            load_more_pause_ms: 0,
        }
    }

    fn full_page(loc: &DetailLocators) -> FakePage {
        FakePage::default()
            .with(&loc.title, "تصميم شعار احترافي")
            .with(&loc.owner, "Ahmed")
            .with(&loc.buyers, "120")
            .with(&loc.votes, "(87)")
            .with(&loc.last_review, "منذ يومين")
            .with(&loc.tags, "logo")
            .with(&loc.tags, "")
            .with(&loc.tags, "branding")
            .with(&loc.category, "تصميم")
            .with(&loc.subcategory, "تصميم شعار")
    }

    #[tokio::test]
    async fn reads_every_field() {
        let loc = DetailLocators::default();
        let mut reader = FakeReader::new().page(URL, full_page(&loc));
        let extractor = DetailExtractor::new(loc, timing());
        let out = extractor.extract(&mut reader, &Target::new("Logo", URL)).await;

        assert!(out.is_success());
        assert_eq!(
            out.rows[0],
            vec![
                "تصميم شعار احترافي",
                "Ahmed",
                "120",
                "87",
                "منذ يومين",
                "تصميم",
                "تصميم شعار",
                "logo, branding",
                URL,
            ]
        );
        assert_eq!(out.categories, vec![("تصميم > تصميم شعار".to_string(), 1)]);
    }

    #[tokio::test]
    async fn missing_fields_take_defaults() {
        let loc = DetailLocators::default();
        let page = FakePage::default().with(&loc.title, "Only a title");
        let mut reader = FakeReader::new().page(URL, page);
        let extractor = DetailExtractor::new(loc, timing());
        let out = extractor.extract(&mut reader, &Target::new("", URL)).await;

        assert_eq!(out.status, Status::Success);
        assert_eq!(
            out.rows[0],
            vec![
                "Only a title",
                NOT_FOUND,
                NOT_FOUND,
                NOT_FOUND,
                NO_REVIEWS,
                UNKNOWN,
                UNKNOWN,
                NO_TAGS,
                URL,
            ]
        );
        assert_eq!(out.categories, vec![("unknown > unknown".to_string(), 1)]);
    }

    #[tokio::test]
    async fn empty_element_is_not_a_missing_one() {
        let loc = DetailLocators::default();
        let page = FakePage::default()
            .with(&loc.title, "T")
            .with(&loc.owner, "")
            .with(&loc.last_review, "");
        let mut reader = FakeReader::new().page(URL, page);
        let extractor = DetailExtractor::new(loc, timing());
        let out = extractor.extract(&mut reader, &Target::new("", URL)).await;

        assert_eq!(out.rows[0][1], "");
        assert_eq!(out.rows[0][2], NOT_FOUND);
        assert_eq!(out.rows[0][4], "");
    }

    #[tokio::test]
    async fn unreadable_tags_keep_the_row() {
        let loc = DetailLocators::default();
        let page = FakePage::default().with(&loc.title, "T");
        let mut reader = FakeReader::new().page(URL, page).failing(&loc.tags);
        let extractor = DetailExtractor::new(loc, timing());
        let out = extractor.extract(&mut reader, &Target::new("", URL)).await;

        assert_eq!(out.status, Status::Success);
        assert_eq!(out.rows[0][0], "T");
        assert_eq!(out.rows[0][7], TAGS_ERROR);
    }

    #[tokio::test]
    async fn broken_page_yields_sentinels() {
        let mut reader = FakeReader::new().broken(URL);
        let extractor = DetailExtractor::new(DetailLocators::default(), timing());
        let out = extractor.extract(&mut reader, &Target::new("", URL)).await;

        assert_eq!(out.status, Status::Error);
        assert_eq!(
            out.rows,
            vec![vec![
                "error", "error", "0", "0", "0", "error", "error", "error", URL
            ]]
        );
        assert_eq!(out.categories, vec![(ERROR_BUCKET.to_string(), 1)]);
    }
}
