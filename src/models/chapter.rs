//! Chapter and series data structures.

use serde::{Deserialize, Serialize};

use crate::models::SourceKind;

/// A chapter release fetched from a source listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    /// Source the chapter came from
    pub source: SourceKind,

    /// Source-scoped identifier of the series the chapter belongs to
    pub series_id: String,

    /// Human-readable chapter label ("184", "10.5", "Oneshot")
    pub label: String,

    /// Full URL to read the chapter
    pub link: String,

    /// Page count, when the source reports one
    pub pages: Option<u32>,

    /// Source-specific unique key used for deduplication
    pub key: String,
}

impl Chapter {
    /// Format chapter for display using a template.
    ///
    /// Supported placeholders:
    /// - `{source}`, `{series_id}`, `{label}`, `{link}`, `{pages}`
    pub fn format(&self, template: &str) -> String {
        let pages = self
            .pages
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        template
            .replace("{source}", self.source.as_str())
            .replace("{series_id}", &self.series_id)
            .replace("{label}", &self.label)
            .replace("{link}", &self.link)
            .replace("{pages}", &pages)
    }
}

/// A series a user can subscribe to, resolved from a pasted URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Series {
    /// Source that owns the series
    pub source: SourceKind,

    /// Source-scoped stable identifier
    pub id: String,

    /// Display title at resolution time; refreshed lazily via the store
    pub title: String,
}
