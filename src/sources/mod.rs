// src/sources/mod.rs

//! Content source adapters.
//!
//! Each supported site implements [`SourceAdapter`]; everything above this
//! module (scrapers, matcher, CLI) works against the trait. Adding a source
//! means adding a variant to `SourceKind`, an adapter here, and a line in
//! [`registry`].

pub mod mangadex;
pub mod mangasee;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chapter, Series, SourceKind, SourcesConfig};

pub use mangadex::MangadexSource;
pub use mangasee::MangaseeSource;

/// Contract every content source implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter speaks for.
    fn kind(&self) -> SourceKind;

    /// The newest releases visible at the source, newest first, bounded by
    /// the configured lookback.
    async fn fetch_latest(&self) -> Result<Vec<Chapter>>;

    /// Resolve a user-pasted URL to a series.
    ///
    /// Returns `Ok(None)` when the URL does not belong to this source;
    /// errors are reserved for URLs that are ours but cannot be resolved.
    async fn parse_link(&self, url: &str) -> Result<Option<Series>>;

    /// Hook run when the source is enabled, before its window is seeded.
    async fn on_enable(&self) -> Result<()> {
        Ok(())
    }

    /// Hook run after the source is disabled.
    async fn on_disable(&self) -> Result<()> {
        Ok(())
    }
}

/// Build one adapter per supported source.
pub fn registry(client: &reqwest::Client, config: &SourcesConfig) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(MangadexSource::new(
            client.clone(),
            config.get(SourceKind::Mangadex).lookback,
        )),
        Arc::new(MangaseeSource::new(
            client.clone(),
            config.get(SourceKind::Mangasee).lookback,
        )),
    ]
}

/// Ask each adapter in turn whether it can resolve the URL.
///
/// Input that does not even parse as a URL is rejected up front, before
/// any adapter gets to fetch anything.
pub async fn resolve_link(
    adapters: &[Arc<dyn SourceAdapter>],
    url: &str,
) -> Result<Option<Series>> {
    if url::Url::parse(url).is_err() {
        return Ok(None);
    }
    for adapter in adapters {
        if let Some(series) = adapter.parse_link(url).await? {
            return Ok(Some(series));
        }
    }
    Ok(None)
}
