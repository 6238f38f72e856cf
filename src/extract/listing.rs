use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::locators::ListingLocators;
use super::{Extraction, Extractor, Status};
use crate::error::Result;
use crate::job::Target;
use crate::reader::PageReader;
use crate::settings::StageSettings;

pub const HEADER: &[&str] = &["category", "title", "link", "image"];

const NO_IMAGE: &str = "N/A";
const ERROR: &str = "error";
/// Title of the single row written for a subcategory page without cards,
/// so the page's URL still has a row behind its checkpoint entry.
pub const NO_SERVICES: &str = "no services";

/// Subcategory page -> one row per service card, after expanding the
/// "load more" pagination.
pub struct ListingExtractor {
    locators: ListingLocators,
    timing: StageSettings,
}

impl ListingExtractor {
    pub fn new(locators: ListingLocators, timing: StageSettings) -> Self {
        ListingExtractor { locators, timing }
    }

    /// Click "load more" until it is gone or the click budget is spent.
    async fn load_more(&self, reader: &mut dyn PageReader) -> Result<usize> {
        let mut clicks = 0;
        while clicks < self.timing.max_load_more {
            if !reader
                .click(&self.locators.load_more, self.timing.wait())
                .await?
            {
                break;
            }
            clicks += 1;
            debug!("Loading page {}...", clicks);
            tokio::time::sleep(self.timing.load_more_pause()).await;
        }
        Ok(clicks)
    }

    async fn try_extract(&self, reader: &mut dyn PageReader, target: &Target) -> Result<Extraction> {
        reader.navigate(&target.url).await?;
        tokio::time::sleep(self.timing.settle()).await;

        let pages = self.load_more(reader).await?;
        if pages > 0 {
            info!("   {} pages loaded", pages);
        }

        let fields = [
            self.locators.title.clone(),
            self.locators.link.clone(),
            self.locators.image.clone(),
        ];
        let cards = reader.read_rows(&self.locators.row, &fields).await?;

        let rows: Vec<Vec<String>> = cards
            .into_iter()
            .filter_map(|cells| {
                let mut cells = cells.into_iter();
                let title = cells.next().flatten()?;
                let link = cells.next().flatten().filter(|l| !l.is_empty())?;
                let image = cells
                    .next()
                    .flatten()
                    .filter(|i| !i.is_empty())
                    .unwrap_or_else(|| NO_IMAGE.to_string());
                Some(vec![target.label.clone(), title, link, image])
            })
            .collect();

        if rows.is_empty() {
            warn!("   0 services found on {}", target.url);
            return Ok(Extraction {
                status: Status::Success,
                rows: vec![vec![
                    target.label.clone(),
                    NO_SERVICES.to_string(),
                    target.url.clone(),
                    NO_IMAGE.to_string(),
                ]],
                categories: Vec::new(),
            });
        }

        info!("   {} services collected", rows.len());
        let categories = vec![(target.label.clone(), rows.len())];
        Ok(Extraction {
            status: Status::Success,
            rows,
            categories,
        })
    }
}

#[async_trait]
impl Extractor for ListingExtractor {
    fn header(&self) -> &'static [&'static str] {
        HEADER
    }

    async fn extract(&self, reader: &mut dyn PageReader, target: &Target) -> Extraction {
        match self.try_extract(reader, target).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("   Listing extraction failed for {}: {}", target.url, e);
                Extraction::failed(vec![
                    target.label.clone(),
                    ERROR.to_string(),
                    target.url.clone(),
                    ERROR.to_string(),
                ])
            }
        }
    }
}
