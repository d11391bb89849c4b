//! Source identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Identifies a supported content source.
///
/// The watcher only ever deals with this closed set: configuration
/// sections, dedup windows, chapter topics, and store records are all
/// keyed by a `SourceKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// MangaDex JSON API
    Mangadex,
    /// Mangasee HTML listing
    Mangasee,
}

impl SourceKind {
    /// Every supported source, in declaration order.
    pub const ALL: [SourceKind; 2] = [SourceKind::Mangadex, SourceKind::Mangasee];

    /// Lowercase identifier used in config sections, logs and store keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Mangadex => "mangadex",
            SourceKind::Mangasee => "mangasee",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mangadex" => Ok(SourceKind::Mangadex),
            "mangasee" => Ok(SourceKind::Mangasee),
            other => Err(AppError::validation(format!("unknown source '{other}'"))),
        }
    }
}
