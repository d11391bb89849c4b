// src/sources/mangadex.rs

//! MangaDex source adapter.
//!
//! Talks to the MangaDex JSON API: the chapter feed ordered by publication
//! time for polling, the manga endpoint for subscribe-by-URL resolution,
//! and `/ping` as the enable-time health check.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Chapter, Series, SourceKind};
use crate::sources::SourceAdapter;

const API_BASE: &str = "https://api.mangadex.org";
const SITE_BASE: &str = "https://mangadex.org";

/// Adapter for mangadex.org.
pub struct MangadexSource {
    client: Client,
    lookback: usize,
}

impl MangadexSource {
    /// Create an adapter fetching up to `lookback` chapters per poll.
    pub fn new(client: Client, lookback: usize) -> Self {
        Self { client, lookback }
    }
}

#[async_trait]
impl SourceAdapter for MangadexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mangadex
    }

    async fn fetch_latest(&self) -> Result<Vec<Chapter>> {
        let url = format!("{API_BASE}/chapter");
        let feed: ChapterFeed = self
            .client
            .get(&url)
            .query(&[
                ("limit", self.lookback.to_string()),
                ("translatedLanguage[]", "en".to_string()),
                ("order[readableAt]", "desc".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_feed(feed)
    }

    async fn parse_link(&self, url: &str) -> Result<Option<Series>> {
        let Some(id) = extract_title_id(url) else {
            return Ok(None);
        };

        let lookup = format!("{API_BASE}/manga/{id}");
        let response: MangaResponse = self
            .client
            .get(&lookup)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if response.result != "ok" {
            return Err(AppError::parse(
                SourceKind::Mangadex,
                format!("manga lookup returned '{}'", response.result),
            ));
        }

        let title = pick_title(&response.data.attributes.title)
            .unwrap_or_else(|| response.data.id.clone());
        Ok(Some(Series {
            source: SourceKind::Mangadex,
            id: response.data.id,
            title,
        }))
    }

    async fn on_enable(&self) -> Result<()> {
        let url = format!("{API_BASE}/ping");
        self.client.get(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ChapterFeed {
    result: String,
    #[serde(default)]
    data: Vec<ChapterEntry>,
}

#[derive(Debug, Deserialize)]
struct ChapterEntry {
    id: String,
    attributes: ChapterAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Default, Deserialize)]
struct ChapterAttributes {
    #[serde(default)]
    chapter: Option<String>,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    id: String,

    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct MangaResponse {
    result: String,
    data: MangaEntry,
}

#[derive(Debug, Deserialize)]
struct MangaEntry {
    id: String,
    attributes: MangaAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: BTreeMap<String, String>,
}

/// Convert a chapter feed into chapters, newest first.
///
/// Entries without a manga relationship cannot be attributed to a series
/// and are skipped with a warning.
fn parse_feed(feed: ChapterFeed) -> Result<Vec<Chapter>> {
    if feed.result != "ok" {
        return Err(AppError::fetch(
            SourceKind::Mangadex,
            format!("chapter feed returned '{}'", feed.result),
        ));
    }

    let mut chapters = Vec::with_capacity(feed.data.len());
    for entry in feed.data {
        let Some(series_id) = entry
            .relationships
            .iter()
            .find(|r| r.kind == "manga")
            .map(|r| r.id.clone())
        else {
            log::warn!("Chapter {} has no manga relationship, skipping", entry.id);
            continue;
        };

        let label = entry
            .attributes
            .chapter
            .or(entry.attributes.title)
            .unwrap_or_else(|| "Oneshot".to_string());

        chapters.push(Chapter {
            source: SourceKind::Mangadex,
            series_id,
            label,
            link: format!("{SITE_BASE}/chapter/{}", entry.id),
            pages: entry.attributes.pages,
            key: entry.id,
        });
    }
    Ok(chapters)
}

/// Pull the manga UUID out of a mangadex.org title URL.
fn extract_title_id(url: &str) -> Option<String> {
    let pattern = Regex::new(
        r"mangadex\.org/title/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})",
    )
    .ok()?;
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Prefer the English title, then romanized Japanese, then anything.
fn pick_title(titles: &BTreeMap<String, String>) -> Option<String> {
    titles
        .get("en")
        .or_else(|| titles.get("ja-ro"))
        .or_else(|| titles.values().next())
        .cloned()
}
