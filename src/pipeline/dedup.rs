// src/pipeline/dedup.rs

//! Bounded window of already-seen chapter keys.
//!
//! Each source gets its own window. Keys are remembered in insertion order
//! and the oldest are evicted once the window is full, so memory stays flat
//! no matter how long the process runs. The capacity just has to exceed the
//! number of releases a source lists between two polls; re-announcing
//! anything older than the window is indistinguishable from a new release.

use std::collections::{HashSet, VecDeque};

/// FIFO set of chapter keys with a fixed capacity.
#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupWindow {
    /// Create an empty window remembering at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Whether a key is currently in the window.
    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Record a key. Returns false if it was already in the window.
    ///
    /// A repeated key does not refresh its position: eviction order is
    /// strictly first-inserted, first-out.
    pub fn mark_seen(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Number of keys currently remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no key has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of keys the window holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
