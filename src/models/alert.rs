//! Alert data structure.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Chapter;

/// A matched release for one guild, ready for fan-out.
///
/// Produced by the subscription matcher: at most one alert exists per
/// (guild, chapter) pair, and `role_ids` carries every role in the guild
/// whose subscriptions matched. Downstream delivery groups those roles by
/// notification channel, so the matcher never has to be queried twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    /// Guild the alert belongs to
    pub guild_id: String,

    /// Every matching role in the guild; non-empty by construction
    pub role_ids: BTreeSet<String>,

    /// Display title of the matched series
    pub series_title: String,

    /// The chapter that triggered the alert
    pub chapter: Chapter,
}
