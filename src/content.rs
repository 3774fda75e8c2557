//! On-demand page scraping: fetch a page, optionally reduce it to readable
//! text, and split the result into bounded segments.

use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::RenderingMode;
use crate::scraper::PageFetcher;
use crate::utils::error::{AppError, Result};

pub const DEFAULT_CHUNK_LENGTH: usize = 5000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeOptions {
    pub mode: RenderingMode,
    /// Reduce the body to text instead of returning raw markup.
    pub clean: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub markup: String,
    pub text: Option<String>,
}

impl ScrapeResult {
    /// Cleaned text when requested, otherwise the raw markup.
    pub fn content(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.markup)
    }

    pub fn chunks(&self, max_length: usize) -> Vec<String> {
        chunk_text(self.content(), max_length)
    }
}

pub async fn scrape(
    fetcher: &dyn PageFetcher,
    url: &str,
    options: &ScrapeOptions,
) -> Result<ScrapeResult> {
    info!(url, mode = ?options.mode, "Scraping page");
    let page = fetcher.fetch(url, options.mode).await?;

    let text = if options.clean {
        let body = extract_body(&page.html).ok_or_else(|| AppError::NotFound {
            resource: format!("body content in {}", url),
        })?;
        Some(clean_text(&body))
    } else {
        None
    };

    Ok(ScrapeResult {
        url: page.final_url,
        markup: page.html,
        text,
    })
}

/// Markup of the `<body>` element. `None` when the document has no body
/// tag; an empty body is still returned.
pub fn extract_body(markup: &str) -> Option<String> {
    // The parser synthesizes a body for any document
    if !has_body_tag(markup) {
        return None;
    }

    let document = Html::parse_document(markup);
    let selector = Selector::parse("body").ok()?;
    let body = document.select(&selector).next()?;
    Some(body.html())
}

fn has_body_tag(markup: &str) -> bool {
    let lower = markup.to_ascii_lowercase();
    lower.match_indices("<body").any(|(start, tag)| {
        matches!(
            lower[start + tag.len()..].chars().next(),
            Some('>' | '/' | ' ' | '\t' | '\n' | '\r' | '\x0c')
        )
    })
}

/// Visible text of `markup`, one trimmed non-empty line per line. Script and
/// style contents are dropped.
pub fn clean_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut pieces: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => matches!(element.name(), "script" | "style"),
            _ => false,
        });
        if !hidden {
            pieces.push(&**text);
        }
    }

    pieces
        .join("\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Consecutive segments of at most `max_length` characters. A zero length
/// yields the whole text as a single segment.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_length == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_length)
        .map(|segment| segment.iter().collect())
        .collect()
}
