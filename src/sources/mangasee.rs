//! Mangasee source adapter.
//!
//! Mangasee has no JSON API; the homepage embeds its latest-release feed as
//! a `vm.LatestJSON = [...]` assignment inside a script tag. Chapters are
//! identified by a six-digit code: the first digit is the season index, the
//! middle four are the zero-padded chapter number, and the last digit is
//! the decimal part ("100105" is chapter 10.5 of season 1).

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Chapter, Series, SourceKind};
use crate::sources::SourceAdapter;
use crate::utils::http::{fetch_page_async, fetch_text_async};

const SITE_BASE: &str = "https://mangasee123.com";

/// Adapter for mangasee123.com.
pub struct MangaseeSource {
    client: Client,
    lookback: usize,
}

impl MangaseeSource {
    /// Create an adapter keeping up to `lookback` releases per poll.
    pub fn new(client: Client, lookback: usize) -> Self {
        Self { client, lookback }
    }
}

#[async_trait]
impl SourceAdapter for MangaseeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mangasee
    }

    async fn fetch_latest(&self) -> Result<Vec<Chapter>> {
        let html = fetch_text_async(&self.client, SITE_BASE).await?;
        let entries = extract_latest_json(&html)?;
        Ok(latest_to_chapters(entries, self.lookback))
    }

    async fn parse_link(&self, url: &str) -> Result<Option<Series>> {
        let Some(index_name) = extract_index_name(url) else {
            return Ok(None);
        };

        let page_url = format!("{SITE_BASE}/manga/{index_name}");
        let document = fetch_page_async(&self.client, &page_url).await?;
        let title = page_title(&document)?
            .unwrap_or_else(|| index_name.replace('-', " "));

        Ok(Some(Series {
            source: SourceKind::Mangasee,
            id: index_name,
            title,
        }))
    }
}

/// One entry of the embedded latest-release feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LatestEntry {
    index_name: String,
    chapter: String,
}

/// Pull `vm.LatestJSON` out of the homepage HTML.
fn extract_latest_json(html: &str) -> Result<Vec<LatestEntry>> {
    let pattern = Regex::new(r"(?s)vm\.LatestJSON\s*=\s*(\[.*?\])\s*;")
        .map_err(|e| AppError::parse(SourceKind::Mangasee, e))?;
    let json = pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| AppError::parse(SourceKind::Mangasee, "vm.LatestJSON not found"))?;
    Ok(serde_json::from_str(json.as_str())?)
}

/// Convert feed entries into chapters, newest first.
fn latest_to_chapters(entries: Vec<LatestEntry>, lookback: usize) -> Vec<Chapter> {
    entries
        .into_iter()
        .take(lookback)
        .filter_map(|entry| {
            let Some(label) = decode_chapter(&entry.chapter) else {
                log::warn!(
                    "Unparseable chapter code '{}' for {}, skipping",
                    entry.chapter,
                    entry.index_name
                );
                return None;
            };
            let link = chapter_link(&entry.index_name, &entry.chapter, &label);
            Some(Chapter {
                source: SourceKind::Mangasee,
                key: format!("{}:{}", entry.index_name, entry.chapter),
                series_id: entry.index_name,
                label,
                link,
                pages: None,
            })
        })
        .collect()
}

/// Decode a chapter code into a display label.
///
/// Drops the leading season digit, strips zero padding from the chapter
/// number, and appends the trailing digit as a decimal when nonzero.
fn decode_chapter(code: &str) -> Option<String> {
    if code.len() < 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole = code[1..code.len() - 1].trim_start_matches('0');
    let whole = if whole.is_empty() { "0" } else { whole };
    let decimal = &code[code.len() - 1..];
    Some(if decimal == "0" {
        whole.to_string()
    } else {
        format!("{whole}.{decimal}")
    })
}

/// Reader URL for a chapter. Seasons other than 1 carry an index suffix.
fn chapter_link(index_name: &str, code: &str, label: &str) -> String {
    let season = &code[..1];
    let suffix = if season == "1" {
        String::new()
    } else {
        format!("-index-{season}")
    };
    format!("{SITE_BASE}/read-online/{index_name}-chapter-{label}{suffix}-page-1.html")
}

/// Pull the series index name out of a mangasee123.com manga URL.
fn extract_index_name(url: &str) -> Option<String> {
    let pattern = Regex::new(r"mangasee123\.com/manga/([A-Za-z0-9-]+)").ok()?;
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The series title from a manga page's heading.
fn page_title(document: &Html) -> Result<Option<String>> {
    let selector =
        Selector::parse("h1").map_err(|e| AppError::selector("h1", format!("{e:?}")))?;
    Ok(document
        .select(&selector)
        .next()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty()))
}
