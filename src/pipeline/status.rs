// src/pipeline/status.rs

//! Per-source health tracking.
//!
//! Every poll attempt ends with a success or failure being recorded here,
//! which both updates the queryable board and publishes a pulse on the
//! status topic. A failure marks the source Down but never disables it,
//! and the next successful poll marks it Up again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SourceKind;
use crate::pipeline::topic::Topic;
use crate::utils::lock;

/// Tri-state source status. `Unknown` means no poll has completed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Unknown,
    Up,
    Down,
}

/// Health record of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHealth {
    /// Outcome of the most recent poll
    pub status: SourceStatus,

    /// When the source last polled successfully
    pub last_up: Option<DateTime<Utc>>,

    /// When the source last failed to poll
    pub last_down: Option<DateTime<Utc>>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            status: SourceStatus::Unknown,
            last_up: None,
            last_down: None,
        }
    }
}

/// Published on the status topic after every poll attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPulse {
    /// Source the pulse is about
    pub source: SourceKind,

    /// Health after applying the poll outcome
    pub health: SourceHealth,

    /// Failure description, present on Down pulses
    pub reason: Option<String>,
}

/// Queryable per-source health, feeding the status topic.
#[derive(Debug)]
pub struct StatusBoard {
    health: Mutex<HashMap<SourceKind, SourceHealth>>,
    topic: Arc<Topic<StatusPulse>>,
}

impl StatusBoard {
    /// Create an empty board publishing pulses on `topic`.
    pub fn new(topic: Arc<Topic<StatusPulse>>) -> Self {
        Self {
            health: Mutex::new(HashMap::new()),
            topic,
        }
    }

    /// Record a successful poll. Keeps `last_down` from earlier failures.
    pub fn record_success(&self, source: SourceKind) {
        let health = {
            let mut map = lock(&self.health);
            let entry = map.entry(source).or_default();
            entry.status = SourceStatus::Up;
            entry.last_up = Some(Utc::now());
            entry.clone()
        };
        self.topic.publish(StatusPulse {
            source,
            health,
            reason: None,
        });
    }

    /// Record a failed poll. Keeps `last_up` from earlier successes.
    pub fn record_failure(&self, source: SourceKind, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("Source {source} is down: {reason}");
        let health = {
            let mut map = lock(&self.health);
            let entry = map.entry(source).or_default();
            entry.status = SourceStatus::Down;
            entry.last_down = Some(Utc::now());
            entry.clone()
        };
        self.topic.publish(StatusPulse {
            source,
            health,
            reason: Some(reason),
        });
    }

    /// Current health of one source; `Unknown` before any poll.
    pub fn health(&self, source: SourceKind) -> SourceHealth {
        lock(&self.health).get(&source).cloned().unwrap_or_default()
    }

    /// Health of every supported source, in declaration order.
    pub fn snapshot(&self) -> Vec<(SourceKind, SourceHealth)> {
        SourceKind::ALL
            .iter()
            .map(|kind| (*kind, self.health(*kind)))
            .collect()
    }
}
