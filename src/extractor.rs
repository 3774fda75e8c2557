use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::scraper::{RawPage, RenderedPage};

/// Locations tried, in order, for a product's main image.
pub const IMAGE_LOCATORS: &[&str] = &[
    r#"img[itemprop="image"]"#,
    ".product-image img",
    "#product-image img",
    ".main-image img",
    ".product-main-image img",
    r#"img[alt*="product"]"#,
    r#"img[alt*="Product"]"#,
];

/// Image URLs containing any of these are treated as decoration.
const SMALL_IMAGE_MARKERS: &[&str] = &["icon", "logo", "thumb", "small"];

pub const DEFAULT_ELEMENT_WAIT: Duration = Duration::from_secs(10);

/// A page as seen by the extractor: markup returned by a plain fetch, or a
/// live rendered document.
#[derive(Clone, Copy)]
pub enum PageView<'a> {
    Static(&'a RawPage),
    Rendered(&'a dyn RenderedPage),
}

/// Derives availability and the representative image from a page.
#[derive(Debug, Clone)]
pub struct Extractor {
    element_wait: Duration,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_ELEMENT_WAIT)
    }
}

impl Extractor {
    pub fn new(element_wait: Duration) -> Self {
        Self { element_wait }
    }

    /// Static pages: case-insensitive substring over the raw markup.
    /// Rendered pages: the element named by `element_selector` must appear
    /// within the element wait and its text must contain the indicator. With
    /// no selector the whole rendered document is searched.
    pub fn matches_stock_indicator(
        &self,
        page: PageView<'_>,
        indicator: &str,
        element_selector: Option<&str>,
    ) -> bool {
        match page {
            PageView::Static(raw) => contains_indicator(&raw.html, indicator),
            PageView::Rendered(live) => match element_selector {
                Some(selector) => match live.wait_for_text(selector, self.element_wait) {
                    Some(text) => contains_indicator(&text, indicator),
                    None => {
                        debug!(selector, "Stock element did not appear");
                        false
                    }
                },
                None => match live.content() {
                    Ok(html) => contains_indicator(&html, indicator),
                    Err(e) => {
                        warn!("Could not read rendered document: {}", e);
                        false
                    }
                },
            },
        }
    }

    pub fn find_representative_image(&self, page: PageView<'_>) -> Option<String> {
        match page {
            PageView::Static(raw) => find_image_in_markup(&raw.html, &raw.final_url),
            PageView::Rendered(live) => match live.content() {
                Ok(html) => find_image_in_markup(&html, &live.url()),
                Err(e) => {
                    warn!("Could not read rendered document for image lookup: {}", e);
                    None
                }
            },
        }
    }
}

pub fn contains_indicator(haystack: &str, indicator: &str) -> bool {
    haystack.to_lowercase().contains(&indicator.to_lowercase())
}

/// First image source found by the ordered locators, else the first image
/// that does not look like an icon, logo or thumbnail. Relative sources are
/// resolved against `base_url`.
pub fn find_image_in_markup(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for locator in IMAGE_LOCATORS {
        let Ok(selector) = Selector::parse(locator) else {
            continue;
        };

        if let Some(src) = document
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr("src"))
            .filter(|src| !src.trim().is_empty())
        {
            return Some(resolve_url(base_url, src));
        }
    }

    let selector = Selector::parse("img").ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(|src| resolve_url(base_url, src))
        .find(|resolved| !is_small_image(resolved))
}

fn resolve_url(base_url: &str, src: &str) -> String {
    let src = src.trim();
    match Url::parse(base_url).and_then(|base| base.join(src)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => src.to_string(),
    }
}

fn is_small_image(url: &str) -> bool {
    let lowered = url.to_lowercase();
    SMALL_IMAGE_MARKERS.iter().any(|marker| lowered.contains(marker))
}
