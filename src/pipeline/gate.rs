// src/pipeline/gate.rs

//! One-shot readiness latches.
//!
//! Scrapers must not poll before their collaborators can absorb the
//! results: the store has to be loaded and the alert dispatcher attached.
//! Each such dependency is a named [`ReadyGate`] that startup code signals
//! exactly once; consumers await the set of gates named in their
//! configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{AppError, Result};

/// Gate signalled once the persistent store has been opened.
pub const GATE_STORE: &str = "store";

/// Gate signalled once the alert dispatcher is subscribed.
pub const GATE_NOTIFIER: &str = "notifier";

/// A named one-shot readiness latch.
///
/// Starts unready. `signal_ready` flips it; repeated signals are no-ops.
/// There is no way back to unready and no timeout: a gate that is never
/// signalled parks its waiters forever.
#[derive(Clone)]
pub struct ReadyGate {
    name: Arc<str>,
    state: Arc<watch::Sender<bool>>,
}

impl ReadyGate {
    /// Create an unready gate.
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            name: name.into().into(),
            state: Arc::new(state),
        }
    }

    /// The gate's name as used in `wait_for` configuration lists.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark the gate ready, waking every waiter. Idempotent.
    pub fn signal_ready(&self) {
        let already = self.state.send_replace(true);
        if !already {
            log::info!("Gate '{}' ready", self.name);
        }
    }

    /// Whether the gate has been signalled, without waiting.
    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    /// Suspend until the gate is ready; returns immediately if it already is.
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // Cannot fail: the sender lives at least as long as `self`.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl std::fmt::Debug for ReadyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyGate")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// The gates assembled at startup, looked up by name.
///
/// Sources name their dependencies in config (`wait_for = ["store"]`);
/// resolving an unknown name is a configuration error for that source.
#[derive(Debug, Default)]
pub struct GateSet {
    gates: HashMap<String, ReadyGate>,
}

impl GateSet {
    /// Build a set containing one unready gate per name.
    pub fn new(names: &[&str]) -> Self {
        let gates = names
            .iter()
            .map(|n| (n.to_string(), ReadyGate::new(*n)))
            .collect();
        Self { gates }
    }

    /// Look up one gate by name.
    pub fn get(&self, name: &str) -> Result<ReadyGate> {
        self.gates.get(name).cloned().ok_or_else(|| {
            AppError::config(format!("unknown readiness gate '{name}'"))
        })
    }

    /// Resolve a configured dependency list into gate handles.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<ReadyGate>> {
        names.iter().map(|n| self.get(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::time::timeout;

    #[tokio::test]
    async fn test_starts_unready() {
        let gate = ReadyGate::new("store");
        assert!(!gate.is_ready());
    }

    #[tokio::test]
    async fn test_signal_is_idempotent() {
        let gate = ReadyGate::new("store");
        gate.signal_ready();
        gate.signal_ready();
        gate.signal_ready();
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_wait_after_signal_returns_immediately() {
        let gate = ReadyGate::new("store");
        gate.signal_ready();
        timeout(Duration::from_millis(100), gate.wait_ready())
            .await
            .expect("wait_ready should not block once signalled");
    }

    #[tokio::test]
    async fn test_signal_releases_all_waiters() {
        let gate = ReadyGate::new("store");

        let mut handles = Vec::new();
        for _ in 0..3 {
            let g = gate.clone();
            handles.push(tokio::spawn(async move { g.wait_ready().await }));
        }

        // Let the waiters park before signalling.
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.signal_ready();

        for handle in handles {
            timeout(Duration::from_secs(1), handle)
                .await
                .expect("waiter should wake")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_gate_set_lookup() {
        let set = GateSet::new(&[GATE_STORE, GATE_NOTIFIER]);
        assert!(set.get(GATE_STORE).is_ok());
        assert!(set.get("warp-core").is_err());

        let resolved = set
            .resolve(&[GATE_STORE.to_string(), GATE_NOTIFIER.to_string()])
            .unwrap();
        assert_eq!(resolved.len(), 2);

        let err = set.resolve(&["store".to_string(), "nope".to_string()]);
        assert!(err.is_err());
    }
}
