use std::collections::HashSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{error, info, warn};
use url::Url;

use crate::input;
use crate::job::{JobRegistry, Target};
use crate::output;
use crate::settings::Settings;

pub const HEADER: &[&str] = &["subcategory", "link"];

const EXCLUDED: &[&str] = &["/service/", "/user/", "?"];

#[derive(Debug, Default)]
pub struct DiscoverReport {
    pub categories: usize,
    pub failed: usize,
    pub subcategories: usize,
}

/// Subcategory links on a category page, in document order, first
/// occurrence of each URL only.
pub fn extract_subcategories(html: &str, category_url: &str, site_root: &str) -> Vec<Target> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").unwrap();

    let root = Url::parse(site_root).ok();
    let host = root
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or_default()
        .to_string();
    let category_path = Url::parse(category_url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut subs = Vec::new();
    for a in document.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let link = if href.starts_with("http") {
            href.to_string()
        } else {
            match root.as_ref().and_then(|r| r.join(href).ok()) {
                Some(u) => u.to_string(),
                None => continue,
            }
        };

        let in_category = link.starts_with(category_url)
            || (!category_path.is_empty() && link.contains(&category_path) && link.contains(&host));
        if !in_category || link == category_url || EXCLUDED.iter().any(|x| link.contains(x)) {
            continue;
        }

        let text = a.text().collect::<String>().trim().to_string();
        if text.chars().count() <= 2 {
            continue;
        }
        if seen.insert(link.clone()) {
            subs.push(Target::new(text, link));
        }
    }
    subs
}

/// Where category pages come from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl PageSource for reqwest::Client {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {}", status.as_u16());
        }
        resp.text().await.context("Failed to read response body")
    }
}

/// Stage (a): one `subcategories/{name}.csv` per top-level category.
pub async fn discover_subcategories(settings: &Settings) -> Result<DiscoverReport> {
    let client = reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .build()?;
    discover_from(settings, &client).await
}

/// Discovery against any page source. A category that cannot be fetched or
/// saved is logged and counted as failed; the rest still run.
pub async fn discover_from(
    settings: &Settings,
    source: &dyn PageSource,
) -> Result<DiscoverReport> {
    let Some(file) = settings.category_file() else {
        bail!(
            "No category file found in {} (looked for {})",
            settings.base_dir.display(),
            settings.discover.category_files.join(", ")
        );
    };
    info!("Reading categories from {}", file.display());
    let categories = input::read_pairs(&file)?;
    info!("{} categories loaded", categories.len());

    let out_dir = settings.subcategories_dir();
    let pause = Duration::from_millis(settings.discover.pause_ms);
    let mut registry = JobRegistry::new();
    let mut report = DiscoverReport::default();

    for (i, cat) in categories.iter().enumerate() {
        report.categories += 1;
        info!("[{}/{}] {}", i + 1, categories.len(), cat.label);

        let stem = match registry.register(&cat.label) {
            Ok(stem) => stem,
            Err(e) => {
                error!("   Skipping: {}", e);
                report.failed += 1;
                continue;
            }
        };

        let html = match source.fetch(&cat.url).await {
            Ok(html) => html,
            Err(e) => {
                error!("   {} failed: {}", cat.url, e);
                report.failed += 1;
                continue;
            }
        };

        let subs = extract_subcategories(&html, &cat.url, &settings.site_root);
        if subs.is_empty() {
            warn!("   No subcategories found for {}", cat.label);
        } else {
            let rows: Vec<Vec<String>> = subs
                .into_iter()
                .map(|t| vec![t.label, t.url])
                .collect();
            let path = out_dir.join(format!("{}.csv", stem));
            if let Err(e) = output::write_table(&path, HEADER, &rows) {
                error!("   Could not save {}: {}", cat.label, e);
                report.failed += 1;
                continue;
            }
            info!("   {} subcategories saved to {}", rows.len(), path.display());
            report.subcategories += rows.len();
        }

        if i + 1 < categories.len() {
            tokio::time::sleep(pause).await;
        }
    }

    info!(
        "Discovery done: {} categories, {} failed, {} subcategories",
        report.categories, report.failed, report.subcategories
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const CATEGORY: &str = "https://khamsat.com/designing";

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/category_page.html").unwrap()
    }

    #[test]
    fn keeps_only_subcategory_links() {
        let subs = extract_subcategories(&fixture(), CATEGORY, "https://khamsat.com");
        let got: Vec<(&str, &str)> = subs
            .iter()
            .map(|t| (t.label.as_str(), t.url.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("تصميم شعار", "https://khamsat.com/designing/logo-design"),
                ("تصميم مطبوعات", "https://khamsat.com/designing/print-design"),
                ("Banners", "https://khamsat.com/designing/banners"),
            ]
        );
    }

    /// Serves fixed HTML per URL; anything else is a 404.
    struct Pages(HashMap<String, String>);

    #[async_trait]
    impl PageSource for Pages {
        async fn fetch(&self, url: &str) -> Result<String> {
            match self.0.get(url) {
                Some(html) => Ok(html.clone()),
                None => bail!("HTTP 404"),
            }
        }
    }

    #[tokio::test]
    async fn failing_category_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings {
            base_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        settings.discover.pause_ms = 0;
        std::fs::write(
            dir.path().join("categories_khamsat.csv"),
            "category,link\n\
             Design,https://khamsat.com/designing\n\
             Missing,https://khamsat.com/missing\n\
             Writing,https://khamsat.com/writing\n\
             Programming,https://khamsat.com/programming\n",
        )
        .unwrap();
        // Design's output path is taken by a directory
        std::fs::create_dir_all(settings.subcategories_dir().join("Design.csv")).unwrap();

        let writing = r#"<a href="/writing/articles">Articles</a>"#;
        let programming = r#"<a href="/programming/web">Web dev</a>"#;
        let pages = Pages(HashMap::from([
            (CATEGORY.to_string(), fixture()),
            ("https://khamsat.com/writing".to_string(), writing.to_string()),
            ("https://khamsat.com/programming".to_string(), programming.to_string()),
        ]));

        let report = discover_from(&settings, &pages).await.unwrap();

        assert_eq!(report.categories, 4);
        assert_eq!(report.failed, 2);
        assert_eq!(report.subcategories, 2);
        let saved =
            std::fs::read_to_string(settings.subcategories_dir().join("Programming.csv")).unwrap();
        assert!(saved.contains("Web dev,https://khamsat.com/programming/web"));
        assert!(settings.subcategories_dir().join("Writing.csv").is_file());
    }

    #[test]
    fn unrelated_page_yields_nothing() {
        let html = r#"<html><body><a href="/programming/web">Web dev</a></body></html>"#;
        assert!(extract_subcategories(html, CATEGORY, "https://khamsat.com").is_empty());
    }
}
