//! Fetching and article-text extraction for insert-by-url.

use crate::error::{DbError, Result};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Containers tried in order before falling back to loose paragraphs.
const ARTICLE_SELECTORS: &[&str] = &[
    "article",
    "section.post-content",
    "div.article-content",
    r#"div[itemprop="articleBody"]"#,
];

/// Tags whose text makes up the extracted article.
const TEXT_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li";

/// Downloads a page and extracts its article text.
///
/// # Errors
///
/// Returns [`DbError::Fetch`] on a network failure, a non-success status
/// or a page with no extractable text. Callers treat any of these as "no
/// content to insert".
pub fn fetch_document(url: &str) -> Result<String> {
    info!(url, "fetching document");

    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DbError::Fetch(format!("cannot build http client: {}", e)))?;

    let response = client.get(url)
        .send()
        .map_err(|e| DbError::Fetch(format!("request to '{}' failed: {}", url, e)))?
        .error_for_status()
        .map_err(|e| DbError::Fetch(format!("request to '{}' failed: {}", url, e)))?;

    let body = response.text()
        .map_err(|e| DbError::Fetch(format!("cannot read body of '{}': {}", url, e)))?;

    extract_article_text(&body)
        .ok_or_else(|| DbError::Fetch(format!("no article text found at '{}'", url)))
}

/// Pulls article text out of an HTML page.
///
/// Tries the known article containers first and collects their paragraph
/// and heading text, one block per line; falls back to every `<p>` tag on
/// the page. Returns `None` when nothing textual is found.
pub fn extract_article_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text_selector = Selector::parse(TEXT_SELECTOR).ok()?;

    for raw in ARTICLE_SELECTORS {
        let selector = Selector::parse(raw).ok()?;
        let mut content = String::new();
        for container in document.select(&selector) {
            for block in container.select(&text_selector) {
                push_block(&mut content, block);
            }
        }
        if !content.trim().is_empty() {
            return Some(content.trim().to_string());
        }
    }

    let paragraphs = Selector::parse("p").ok()?;
    let mut content = String::new();
    for block in document.select(&paragraphs) {
        push_block(&mut content, block);
    }

    let content = content.trim();
    if content.is_empty() { None } else { Some(content.to_string()) }
}

fn push_block(content: &mut String, block: scraper::ElementRef<'_>) {
    let block_text = block.text().collect::<String>();
    let block_text = block_text.trim();
    if !block_text.is_empty() {
        content.push_str(block_text);
        content.push('\n');
    }
}
