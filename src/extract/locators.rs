//! Where each field lives on the site. Swap these out when the markup
//! changes; the extractors only see `Locator`s.

use crate::reader::{Locator, Selector};

#[derive(Debug, Clone)]
pub struct ListingLocators {
    pub load_more: Locator,
    pub row: Selector,
    /// Relative to `row`, CSS only.
    pub title: Locator,
    pub link: Locator,
    pub image: Locator,
}

#[derive(Debug, Clone)]
pub struct DetailLocators {
    pub title: Locator,
    pub owner: Locator,
    pub buyers: Locator,
    pub votes: Locator,
    pub last_review: Locator,
    pub tags: Locator,
    pub category: Locator,
    pub subcategory: Locator,
}

const ROW_TITLE: &str = "div > div:nth-of-type(2) > h4 > a";

impl Default for ListingLocators {
    fn default() -> Self {
        ListingLocators {
            load_more: Locator::css("#load_more_content"),
            row: Selector::Css("div[id^='service-']".to_string()),
            title: Locator::css(ROW_TITLE),
            link: Locator::css(ROW_TITLE).attr("href"),
            image: Locator::css("div > div:nth-of-type(1) img").attr("src"),
        }
    }
}

impl Default for DetailLocators {
    fn default() -> Self {
        DetailLocators {
            title: Locator::xpath("//h1"),
            owner: Locator::xpath(
                r#"//div[@id="service_owner"]//a[contains(@class, "sidebar_user")]"#,
            ),
            buyers: Locator::xpath(
                r#"//div[contains(@class, "col-6")][span[contains(text(), "المشترين")]]/following-sibling::div[1]/span"#,
            ),
            votes: Locator::xpath(
                r#"//div[contains(@class, "col-6")][span[contains(text(), "التقييمات")]]/following-sibling::div[1]//li[contains(@class, "info")]"#,
            ),
            last_review: Locator::xpath(
                r#"//*[@id="reviews-section"]//div[contains(@class, "review_section")][1]//div[contains(@class, "meta--date")]/span[2]"#,
            ),
            tags: Locator::css("ul.c-list--tags li a"),
            category: Locator::xpath(r#"//ol[contains(@class, "breadcrumb")]//li[2]//a"#),
            subcategory: Locator::xpath(r#"//ol[contains(@class, "breadcrumb")]//li[3]//a"#),
        }
    }
}
