use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CrawlError, Result};
use crate::reader::{Locator, PageReader, Read, Selector};
use crate::settings::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const TEXT_JS: &str = "function() { return this.textContent; }";
const CLICK_JS: &str = "function() { this.click(); }";

fn browser_err(e: impl std::fmt::Display) -> CrawlError {
    CrawlError::Browser(e.to_string())
}

/// One Chrome tab driven over CDP, reused for every target of the run.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    remote: bool,
}

impl BrowserSession {
    pub async fn launch(settings: &Settings) -> Result<Self> {
        let opts = &settings.browser;
        let (browser, mut handler) = match &opts.remote_url {
            Some(url) => {
                info!("Connecting to remote Chrome at {}", url);
                Browser::connect(url.as_str()).await.map_err(browser_err)?
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .no_sandbox()
                    .window_size(opts.window_width, opts.window_height)
                    .request_timeout(Duration::from_millis(opts.request_timeout_ms))
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg(format!("--user-agent={}", settings.user_agent));
                if !opts.headless {
                    builder = builder.with_head();
                }
                let config = builder.build().map_err(CrawlError::Browser)?;
                Browser::launch(config).await.map_err(browser_err)?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        info!("Browser session ready (headless: {})", opts.headless);

        Ok(BrowserSession {
            browser,
            page,
            handler,
            remote: opts.remote_url.is_some(),
        })
    }

    /// Tear the session down. A remote browser only loses our tab.
    pub async fn close(mut self) {
        if self.remote {
            if let Err(e) = self.page.close().await {
                warn!("Failed to close tab: {}", e);
            }
        } else {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("Browser did not exit cleanly: {}", e);
            }
        }
        self.handler.abort();
        info!("Browser session closed");
    }

    async fn find(&self, selector: &Selector) -> Option<Element> {
        let found = match selector {
            Selector::Css(css) => self.page.find_element(css.as_str()).await,
            Selector::XPath(xpath) => self.page.find_xpath(xpath.as_str()).await,
        };
        found.ok()
    }

    async fn find_all(&self, selector: &Selector) -> Vec<Element> {
        let found = match selector {
            Selector::Css(css) => self.page.find_elements(css.as_str()).await,
            Selector::XPath(xpath) => self.page.find_xpaths(xpath.as_str()).await,
        };
        found.unwrap_or_default()
    }

    /// Poll for `selector` until it shows up or `wait` runs out.
    async fn wait_for(&self, selector: &Selector, wait: Duration) -> Option<Element> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(el) = self.find(selector).await {
                return Some(el);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Text content or attribute/property of `el`, trimmed.
async fn read_element(el: &Element, read: &Read) -> Result<Option<String>> {
    let js = match read {
        Read::Text => TEXT_JS.to_string(),
        Read::Attribute(name) => format!(
            "function() {{ const v = this[{0:?}] ?? this.getAttribute({0:?}); return v == null ? null : String(v); }}",
            name
        ),
    };
    let ret = el.call_js_fn(js, false).await.map_err(browser_err)?;
    Ok(ret
        .result
        .value
        .and_then(|v| v.as_str().map(|s| s.trim().to_string())))
}

#[async_trait]
impl PageReader for BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn read(&mut self, locator: &Locator, wait: Duration) -> Result<Option<String>> {
        match self.wait_for(&locator.selector, wait).await {
            Some(el) => read_element(&el, &locator.read).await,
            None => {
                debug!("Not found within {:?}: {:?}", wait, locator.selector);
                Ok(None)
            }
        }
    }

    async fn read_all(&mut self, locator: &Locator) -> Result<Vec<String>> {
        let mut values = Vec::new();
        for el in self.find_all(&locator.selector).await {
            if let Some(v) = read_element(&el, &locator.read).await? {
                if !v.is_empty() {
                    values.push(v);
                }
            }
        }
        Ok(values)
    }

    async fn click(&mut self, locator: &Locator, wait: Duration) -> Result<bool> {
        let Some(el) = self.wait_for(&locator.selector, wait).await else {
            return Ok(false);
        };
        if let Err(e) = el.scroll_into_view().await {
            debug!("Scroll before click failed: {}", e);
            return Ok(false);
        }
        match el.call_js_fn(CLICK_JS, false).await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("Click failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn read_rows(
        &mut self,
        row: &Selector,
        fields: &[Locator],
    ) -> Result<Vec<Vec<Option<String>>>> {
        let mut rows = Vec::new();
        for el in self.find_all(row).await {
            let mut cells = Vec::with_capacity(fields.len());
            for field in fields {
                let css = match &field.selector {
                    Selector::Css(css) => css,
                    Selector::XPath(xpath) => {
                        return Err(CrawlError::Browser(format!(
                            "row fields must be CSS selectors, got XPath {}",
                            xpath
                        )))
                    }
                };
                let value = match el.find_element(css.as_str()).await {
                    Ok(child) => read_element(&child, &field.read).await?,
                    Err(_) => None,
                };
                cells.push(value);
            }
            rows.push(cells);
        }
        Ok(rows)
    }
}
