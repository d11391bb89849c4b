// src/app.rs

//! Application assembly.
//!
//! Everything is wired here, in one place: topics, store, scheduler, status
//! board, source adapters and their scrapers. Components receive their
//! collaborators as constructor arguments and never reach into globals, so
//! tests can assemble the same graph around fakes.
//!
//! Startup order matters. The store gate is signalled once the store is
//! usable, the notifier gate once the matcher and dispatcher are attached,
//! and only then are the scrapers initialized. A scraper whose config lists
//! those gates in `wait_for` therefore cannot poll into a half-wired app.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::Result;
use crate::models::{Config, Series, SourceKind};
use crate::pipeline::gate::{GATE_NOTIFIER, GATE_STORE, GateSet};
use crate::pipeline::scheduler::Scheduler;
use crate::pipeline::scraper::Scraper;
use crate::pipeline::status::StatusBoard;
use crate::pipeline::topic::Broker;
use crate::services::{AlertDispatcher, Matcher, Notifier};
use crate::sources::{self, SourceAdapter};
use crate::storage::{JsonStore, Store};
use crate::utils::http;

/// The assembled application.
pub struct App {
    config: Config,
    store: Arc<dyn Store>,
    broker: Arc<Broker>,
    scheduler: Scheduler,
    status: Arc<StatusBoard>,
    gates: GateSet,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    scrapers: Vec<Arc<Scraper>>,
}

impl App {
    /// Build the full object graph from a validated configuration.
    ///
    /// A source whose own section fails validation is skipped with an error
    /// log; the remaining sources still run.
    pub async fn build(config: Config) -> Result<Self> {
        config.validate()?;

        let client = http::create_async_client(&config.http)?;
        let store: Arc<dyn Store> = Arc::new(JsonStore::open(&config.store.path).await?);
        let broker = Arc::new(Broker::new());
        let gates = GateSet::new(&[GATE_STORE, GATE_NOTIFIER]);
        let scheduler = Scheduler::start(Duration::from_millis(
            config.scheduler.trigger_resolution_ms,
        ));
        let status = Arc::new(StatusBoard::new(broker.status().clone()));
        let adapters = sources::registry(&client, &config.sources);

        let mut scrapers = Vec::new();
        for adapter in &adapters {
            let kind = adapter.kind();
            let source_config = config.sources.get(kind);
            if let Err(err) = source_config.validate(kind) {
                log::error!("Skipping source {kind}: {err}");
                continue;
            }
            let resolved_gates = match gates.resolve(&source_config.wait_for) {
                Ok(resolved) => resolved,
                Err(err) => {
                    log::error!("Skipping source {kind}: {err}");
                    continue;
                }
            };
            scrapers.push(Arc::new(Scraper::new(
                Arc::clone(adapter),
                source_config,
                config.dedup.capacity,
                resolved_gates,
                scheduler.clone(),
                broker.chapters(kind).clone(),
                Arc::clone(&status),
                Arc::clone(&store),
            )));
        }

        Ok(Self {
            config,
            store,
            broker,
            scheduler,
            status,
            gates,
            adapters,
            scrapers,
        })
    }

    /// Attach the consumers, open the gates and bring up the scrapers.
    ///
    /// A scraper that fails to initialize (for example because seeding hit
    /// a network error) is logged and left disabled; the rest start.
    pub async fn start(&self, notifier: Arc<dyn Notifier>) -> Result<()> {
        self.gates.get(GATE_STORE)?.signal_ready();

        let matcher = Arc::new(Matcher::new(
            Arc::clone(&self.store),
            self.broker.alerts().clone(),
        ));
        matcher.attach(&self.broker);

        let dispatcher = Arc::new(AlertDispatcher::new(Arc::clone(&self.store), notifier));
        dispatcher.attach(&self.broker);
        self.gates.get(GATE_NOTIFIER)?.signal_ready();

        let inits = self.scrapers.iter().map(|scraper| {
            let scraper = Arc::clone(scraper);
            async move { (scraper.kind(), scraper.init().await) }
        });
        for (kind, result) in join_all(inits).await {
            if let Err(err) = result {
                log::error!("Source {kind} failed to start: {err}");
            }
        }
        Ok(())
    }

    /// Start everything and block until Ctrl-C.
    pub async fn run(&self, notifier: Arc<dyn Notifier>) -> Result<()> {
        self.start(notifier).await?;
        log::info!("Watcher running. Press Ctrl-C to stop.");
        tokio::signal::ctrl_c().await?;
        log::info!("Shutting down");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    pub fn scrapers(&self) -> &[Arc<Scraper>] {
        &self.scrapers
    }

    /// The scraper of one source, if its config was valid at build time.
    pub fn scraper(&self, kind: SourceKind) -> Option<&Arc<Scraper>> {
        self.scrapers.iter().find(|s| s.kind() == kind)
    }

    /// Ask every adapter to claim a pasted series URL.
    pub async fn resolve_link(&self, url: &str) -> Result<Option<Series>> {
        sources::resolve_link(&self.adapters, url).await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("scrapers", &self.scrapers.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
