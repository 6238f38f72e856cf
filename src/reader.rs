use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

/// What to take from a located element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Read {
    Text,
    Attribute(String),
}

/// Declarative field locator: where the element is and what to read off it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub selector: Selector,
    pub read: Read,
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator {
            selector: Selector::Css(selector.to_string()),
            read: Read::Text,
        }
    }

    pub fn xpath(selector: &str) -> Self {
        Locator {
            selector: Selector::XPath(selector.to_string()),
            read: Read::Text,
        }
    }

    /// Same element, read `name` instead of the text content.
    pub fn attr(mut self, name: &str) -> Self {
        self.read = Read::Attribute(name.to_string());
        self
    }
}

/// A live page that can be pointed at a URL and queried through locators.
///
/// Lookups that find nothing are `Ok(None)` / empty / `false`; `Err` is
/// reserved for the session itself failing (navigation, dead browser).
#[async_trait]
pub trait PageReader: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Text of the first match, waiting up to `wait` for it to appear.
    async fn read(&mut self, locator: &Locator, wait: Duration) -> Result<Option<String>>;

    /// Every current match, without waiting. Empty strings are dropped.
    async fn read_all(&mut self, locator: &Locator) -> Result<Vec<String>>;

    /// Click the first match once it is present; `false` if it never was.
    async fn click(&mut self, locator: &Locator, wait: Duration) -> Result<bool>;

    /// For every element matching `row`, read each of `fields` relative to it.
    async fn read_rows(
        &mut self,
        row: &Selector,
        fields: &[Locator],
    ) -> Result<Vec<Vec<Option<String>>>>;
}

#[cfg(test)]
pub mod fake {
    //! Scripted in-memory pages for driving extractors and the job loop.

    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::error::CrawlError;

    #[derive(Debug, Default, Clone)]
    pub struct FakePage {
        pub values: HashMap<Locator, Vec<String>>,
        pub rows: Vec<HashMap<Locator, String>>,
        /// How many times "load more" can still be clicked.
        pub load_more: usize,
    }

    impl FakePage {
        pub fn with(mut self, locator: &Locator, value: &str) -> Self {
            self.values
                .entry(locator.clone())
                .or_default()
                .push(value.to_string());
            self
        }

        pub fn row(mut self, cells: &[(&Locator, &str)]) -> Self {
            self.rows.push(
                cells
                    .iter()
                    .map(|(l, v)| ((*l).clone(), v.to_string()))
                    .collect(),
            );
            self
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeReader {
        pages: HashMap<String, FakePage>,
        broken: HashSet<String>,
        failing: HashSet<Locator>,
        current: Option<String>,
        pub visited: Vec<String>,
        pub clicks: usize,
    }

    impl FakeReader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, page: FakePage) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }

        /// Navigating to `url` fails.
        pub fn broken(mut self, url: &str) -> Self {
            self.broken.insert(url.to_string());
            self
        }

        /// `read_all` on `locator` fails as if the session dropped.
        pub fn failing(mut self, locator: &Locator) -> Self {
            self.failing.insert(locator.clone());
            self
        }

        fn current(&mut self) -> Result<&mut FakePage> {
            let url = self
                .current
                .clone()
                .ok_or_else(|| CrawlError::Browser("no page loaded".into()))?;
            self.pages
                .get_mut(&url)
                .ok_or_else(|| CrawlError::Browser(format!("no page for {}", url)))
        }
    }

    #[async_trait]
    impl PageReader for FakeReader {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.visited.push(url.to_string());
            if self.broken.contains(url) || !self.pages.contains_key(url) {
                self.current = None;
                return Err(CrawlError::Browser(format!("net::ERR_FAILED at {}", url)));
            }
            self.current = Some(url.to_string());
            Ok(())
        }

        async fn read(&mut self, locator: &Locator, _wait: Duration) -> Result<Option<String>> {
            Ok(self
                .current()?
                .values
                .get(locator)
                .and_then(|v| v.first().cloned()))
        }

        async fn read_all(&mut self, locator: &Locator) -> Result<Vec<String>> {
            if self.failing.contains(locator) {
                return Err(CrawlError::Browser("target closed".into()));
            }
            Ok(self
                .current()?
                .values
                .get(locator)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|v| !v.is_empty())
                .collect())
        }

        async fn click(&mut self, _locator: &Locator, _wait: Duration) -> Result<bool> {
            let page = self.current()?;
            if page.load_more == 0 {
                return Ok(false);
            }
            page.load_more -= 1;
            self.clicks += 1;
            Ok(true)
        }

        async fn read_rows(
            &mut self,
            _row: &Selector,
            fields: &[Locator],
        ) -> Result<Vec<Vec<Option<String>>>> {
            Ok(self
                .current()?
                .rows
                .iter()
                .map(|row| fields.iter().map(|f| row.get(f).cloned()).collect())
                .collect())
        }
    }
}
