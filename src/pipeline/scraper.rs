// src/pipeline/scraper.rs

//! Per-source polling lifecycle.
//!
//! One [`Scraper`] wraps one source adapter and owns everything periodic
//! about it: the enabled flag, the dedup window, and the one-shot poll task
//! it keeps re-registering on the shared scheduler. A source disabled in
//! configuration is inert for the whole process lifetime; a source disabled
//! at runtime keeps its scraper around and can be re-enabled without a
//! restart.
//!
//! Polls never overlap. Every firing re-arms the next one first, then runs
//! the poll body only if the previous body already finished; a slow body
//! therefore skips firings instead of queueing them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;

use crate::error::Result;
use crate::models::{Chapter, SourceConfig, SourceKind};
use crate::pipeline::dedup::DedupWindow;
use crate::pipeline::gate::ReadyGate;
use crate::pipeline::scheduler::Scheduler;
use crate::pipeline::status::StatusBoard;
use crate::pipeline::topic::Topic;
use crate::sources::SourceAdapter;
use crate::storage::Store;
use crate::utils::lock;

/// Polling state machine for one source.
pub struct Scraper {
    kind: SourceKind,
    adapter: Arc<dyn SourceAdapter>,
    interval: Duration,
    /// Disabled in configuration. Terminal: `enable` cannot override it.
    explicitly_disabled: bool,
    enabled: AtomicBool,
    in_flight: AtomicBool,
    window: Mutex<DedupWindow>,
    gates: Vec<ReadyGate>,
    scheduler: Scheduler,
    topic: Arc<Topic<Chapter>>,
    status: Arc<StatusBoard>,
    store: Arc<dyn Store>,
}

impl Scraper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        config: &SourceConfig,
        dedup_capacity: usize,
        gates: Vec<ReadyGate>,
        scheduler: Scheduler,
        topic: Arc<Topic<Chapter>>,
        status: Arc<StatusBoard>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            kind: adapter.kind(),
            adapter,
            interval: Duration::from_secs(config.poll_interval_secs),
            explicitly_disabled: config.disabled,
            enabled: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            window: Mutex::new(DedupWindow::new(dedup_capacity)),
            gates,
            scheduler,
            topic,
            status,
            store,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Whether this source is currently polling.
    pub fn is_enabled(&self) -> bool {
        !self.explicitly_disabled && self.enabled.load(Ordering::SeqCst)
    }

    /// Whether configuration shut this source off for good.
    pub fn is_explicitly_disabled(&self) -> bool {
        self.explicitly_disabled
    }

    /// Restore the persisted enabled flag and start polling if it was set.
    ///
    /// Returns whether the source ended up enabled. Sources disabled in
    /// configuration stay off no matter what the store says.
    pub async fn init(self: &Arc<Self>) -> Result<bool> {
        if self.explicitly_disabled {
            log::info!("Source {} is disabled by configuration", self.kind);
            return Ok(false);
        }
        let stored = self.store.source_enabled(self.kind).await?;
        if stored != Some(true) {
            log::info!("Source {} starts disabled", self.kind);
            return Ok(false);
        }
        self.enabled.store(true, Ordering::SeqCst);
        match self.start_polling().await {
            Ok(()) => {
                log::info!("Source {} restored as enabled", self.kind);
                Ok(true)
            }
            Err(err) => {
                self.enabled.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Turn the source on: persist the flag, wait for gates, seed the dedup
    /// window and register the poll task.
    ///
    /// Returns `Ok(false)` if the source was already enabled or is disabled
    /// in configuration. If the start sequence fails the persisted flag is
    /// rolled back and the error is returned, so a later retry starts from
    /// a clean disabled state.
    pub async fn enable(self: &Arc<Self>) -> Result<bool> {
        if self.explicitly_disabled {
            log::warn!(
                "Source {} is disabled by configuration and cannot be enabled",
                self.kind
            );
            return Ok(false);
        }
        if self.enabled.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        if let Err(err) = self.store.set_source_enabled(self.kind, true).await {
            self.enabled.store(false, Ordering::SeqCst);
            return Err(err);
        }
        match self.start_polling().await {
            Ok(()) => {
                log::info!("Source {} enabled", self.kind);
                Ok(true)
            }
            Err(err) => {
                self.enabled.store(false, Ordering::SeqCst);
                if let Err(store_err) = self.store.set_source_enabled(self.kind, false).await {
                    log::error!(
                        "Source {}: failed to roll back enabled flag: {store_err}",
                        self.kind
                    );
                }
                Err(err)
            }
        }
    }

    /// Turn the source off: unregister the poll task and persist the flag.
    ///
    /// Returns `Ok(false)` if the source was not enabled. A poll body
    /// already in flight finishes, but nothing fires after it.
    pub async fn disable(&self) -> Result<bool> {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.scheduler.remove_task(&self.task_id());
        self.store.set_source_enabled(self.kind, false).await?;
        if let Err(err) = self.adapter.on_disable().await {
            log::warn!("Source {}: on_disable hook failed: {err}", self.kind);
        }
        log::info!("Source {} disabled", self.kind);
        Ok(true)
    }

    fn task_id(&self) -> String {
        format!("poll.{}", self.kind)
    }

    async fn start_polling(self: &Arc<Self>) -> Result<()> {
        for gate in &self.gates {
            if !gate.is_ready() {
                log::info!(
                    "Source {} waiting for readiness gate '{}'",
                    self.kind,
                    gate.name()
                );
            }
            gate.wait_ready().await;
        }
        self.adapter.on_enable().await?;
        self.seed_if_empty().await?;
        self.schedule_next(self.interval).await
    }

    /// Fill an empty dedup window from the current listing without
    /// publishing anything, so enabling a source does not announce its
    /// whole back catalog.
    async fn seed_if_empty(&self) -> Result<()> {
        if !lock(&self.window).is_empty() {
            return Ok(());
        }
        let chapters = self.adapter.fetch_latest().await?;
        let count = chapters.len();
        let mut window = lock(&self.window);
        for chapter in &chapters {
            window.mark_seen(&chapter.key);
        }
        drop(window);
        log::info!("Source {} seeded with {count} known chapters", self.kind);
        Ok(())
    }

    async fn schedule_next(self: &Arc<Self>, delay: Duration) -> Result<()> {
        let scraper = Arc::clone(self);
        self.scheduler
            .add_task(self.task_id(), delay, move || scraper.fire())
            .await
    }

    /// One firing of the poll task. Re-arms before polling so the cadence
    /// survives a slow or hung poll body.
    ///
    /// Boxed because the future is recursive: firing re-registers itself
    /// via [`Scraper::schedule_next`].
    fn fire(self: Arc<Self>) -> futures::future::BoxFuture<'static, ()> {
        async move {
            if !self.enabled.load(Ordering::SeqCst) {
                return;
            }
            if let Err(err) = self.schedule_next(self.interval).await {
                log::error!("Source {}: failed to re-arm poll task: {err}", self.kind);
            }
            if self.in_flight.swap(true, Ordering::SeqCst) {
                log::warn!(
                    "Source {}: previous poll still running, skipping this firing",
                    self.kind
                );
                return;
            }
            self.poll_once().await;
            self.in_flight.store(false, Ordering::SeqCst);
        }
        .boxed()
    }

    async fn poll_once(&self) {
        log::debug!("Polling {}", self.kind);
        match self.adapter.fetch_latest().await {
            Ok(chapters) => {
                let fresh = self.filter_fresh(chapters);
                if !fresh.is_empty() {
                    log::info!("Source {}: {} new chapter(s)", self.kind, fresh.len());
                }
                // Listings come newest first; announce oldest first.
                for chapter in fresh.into_iter().rev() {
                    self.topic.publish(chapter);
                }
                self.status.record_success(self.kind);
            }
            Err(err) => {
                self.status.record_failure(self.kind, err.to_string());
            }
        }
    }

    fn filter_fresh(&self, chapters: Vec<Chapter>) -> Vec<Chapter> {
        let mut window = lock(&self.window);
        chapters
            .into_iter()
            .filter(|chapter| window.mark_seen(&chapter.key))
            .collect()
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
