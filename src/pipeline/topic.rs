// src/pipeline/topic.rs

//! Typed publish/subscribe topics.
//!
//! # Guarantees
//!
//! - **Fire-and-forget publish**: publishing never waits for handlers
//! - **Per-subscriber ordering**: one subscriber's handler runs strictly
//!   sequentially; ordering across subscribers is unspecified
//! - **Isolation**: a handler that panics kills only its own worker task;
//!   the dead subscription is dropped on the next publish
//! - **Retained payload**: each topic remembers the most recent payload for
//!   non-blocking queries, regardless of subscriber count
//!
//! Events are in-memory only. A subscriber registered after a publish does
//! not see that publish (except through [`Topic::last_payload`]).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::models::{Alert, Chapter, SourceKind};
use crate::pipeline::status::StatusPulse;
use crate::utils::lock;

/// A named topic carrying payloads of one type.
pub struct Topic<T> {
    name: String,
    last: Mutex<Option<T>>,
    subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<T>>>,
}

impl<T: Clone + Send + 'static> Topic<T> {
    /// Create an empty topic.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last: Mutex::new(None),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// The topic's name as it appears in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a handler under a unique id.
    ///
    /// Spawns a dedicated worker task that feeds the handler one payload at
    /// a time, so invocations of a single subscriber never overlap. Returns
    /// false (and logs an error) if the id is already taken, leaving the
    /// existing subscriber untouched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F, Fut>(&self, id: impl Into<String>, handler: F) -> bool
    where
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let mut subs = lock(&self.subscribers);
        if subs.contains_key(&id) {
            log::error!(
                "Topic '{}': subscriber '{}' is already registered",
                self.name,
                id
            );
            return false;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                handler(payload).await;
            }
        });

        log::debug!("Topic '{}': subscriber '{}' registered", self.name, id);
        subs.insert(id, tx);
        true
    }

    /// Remove a subscriber, stopping its worker after the queue drains.
    ///
    /// Returns false (and logs an error) if no such subscriber exists.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let mut subs = lock(&self.subscribers);
        if subs.remove(id).is_some() {
            log::debug!("Topic '{}': subscriber '{}' removed", self.name, id);
            true
        } else {
            log::error!(
                "Topic '{}': no subscriber '{}' to remove",
                self.name,
                id
            );
            false
        }
    }

    /// Publish a payload to every subscriber and retain it as the latest.
    ///
    /// Enqueues to each subscriber's worker and returns without waiting.
    /// Publishing with zero subscribers is legal and only updates the
    /// retained payload.
    pub fn publish(&self, payload: T) {
        *lock(&self.last) = Some(payload.clone());

        let mut subs = lock(&self.subscribers);
        subs.retain(|id, tx| {
            if tx.send(payload.clone()).is_ok() {
                true
            } else {
                log::warn!(
                    "Topic '{}': dropping dead subscriber '{}'",
                    self.name,
                    id
                );
                false
            }
        });
    }

    /// The most recently published payload, if any. Never blocks.
    pub fn last_payload(&self) -> Option<T> {
        lock(&self.last).clone()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl<T> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic").field("name", &self.name).finish()
    }
}

/// The topics assembled at startup, one strongly-typed handle each.
///
/// Chapter releases get one topic per source so consumers can pick which
/// sources to follow; status pulses and alerts each share a single topic.
#[derive(Debug)]
pub struct Broker {
    mangadex_chapters: Arc<Topic<Chapter>>,
    mangasee_chapters: Arc<Topic<Chapter>>,
    status: Arc<Topic<StatusPulse>>,
    alerts: Arc<Topic<Alert>>,
}

impl Broker {
    /// Create all topics.
    pub fn new() -> Self {
        Self {
            mangadex_chapters: Arc::new(Topic::new("chapters.mangadex")),
            mangasee_chapters: Arc::new(Topic::new("chapters.mangasee")),
            status: Arc::new(Topic::new("status")),
            alerts: Arc::new(Topic::new("alerts")),
        }
    }

    /// The chapter topic for one source.
    pub fn chapters(&self, kind: SourceKind) -> &Arc<Topic<Chapter>> {
        match kind {
            SourceKind::Mangadex => &self.mangadex_chapters,
            SourceKind::Mangasee => &self.mangasee_chapters,
        }
    }

    /// The status pulse topic.
    pub fn status(&self) -> &Arc<Topic<StatusPulse>> {
        &self.status
    }

    /// The alert topic.
    pub fn alerts(&self) -> &Arc<Topic<Alert>> {
        &self.alerts
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
