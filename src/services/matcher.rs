// src/services/matcher.rs

//! Turns chapter events into per-guild alerts.
//!
//! The matcher subscribes to every chapter topic and, for each chapter,
//! walks the stored guilds and roles to find subscribers. All matching
//! roles of one guild are folded into a single [`Alert`] so the dispatcher
//! can mention them together in one message.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Alert, Chapter, SourceKind};
use crate::pipeline::topic::{Broker, Topic};
use crate::storage::Store;

pub struct Matcher {
    store: Arc<dyn Store>,
    alerts: Arc<Topic<Alert>>,
}

impl Matcher {
    pub fn new(store: Arc<dyn Store>, alerts: Arc<Topic<Alert>>) -> Self {
        Self { store, alerts }
    }

    /// Subscribe to the chapter topic of every source.
    pub fn attach(self: &Arc<Self>, broker: &Broker) {
        for kind in SourceKind::ALL {
            let matcher = Arc::clone(self);
            broker.chapters(kind).subscribe("matcher", move |chapter| {
                let matcher = Arc::clone(&matcher);
                async move {
                    matcher.handle(chapter).await;
                }
            });
        }
    }

    async fn handle(&self, chapter: Chapter) {
        match self.match_chapter(&chapter).await {
            Ok(alerts) => {
                for alert in alerts {
                    self.alerts.publish(alert);
                }
            }
            Err(err) => {
                log::error!(
                    "Matcher: dropping chapter {}/{} after store error: {err}",
                    chapter.source,
                    chapter.series_id
                );
            }
        }
    }

    /// All alerts one chapter produces, one per guild with at least one
    /// subscribed role.
    async fn match_chapter(&self, chapter: &Chapter) -> Result<Vec<Alert>> {
        let title = self
            .store
            .title(chapter.source, &chapter.series_id)
            .await?
            .unwrap_or_else(|| chapter.series_id.clone());
        let mut alerts = Vec::new();
        for guild_id in self.store.guilds().await? {
            let mut role_ids = BTreeSet::new();
            for role_id in self.store.roles(&guild_id).await? {
                let subscribed = self
                    .store
                    .is_subscribed(&guild_id, &role_id, chapter.source, &chapter.series_id)
                    .await?;
                if subscribed {
                    role_ids.insert(role_id);
                }
            }
            if !role_ids.is_empty() {
                alerts.push(Alert {
                    guild_id,
                    role_ids,
                    series_title: title.clone(),
                    chapter: chapter.clone(),
                });
            }
        }
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStore;
    use crate::utils::lock;
    use std::sync::Mutex;
    use std::time::Duration;

    fn chapter(series_id: &str) -> Chapter {
        Chapter {
            source: SourceKind::Mangadex,
            series_id: series_id.to_string(),
            label: "Chapter 12".to_string(),
            link: format!("https://example.com/{series_id}/12"),
            pages: None,
            key: format!("{series_id}-12"),
        }
    }

    fn setup() -> (Arc<JsonStore>, Broker, Arc<Mutex<Vec<Alert>>>) {
        let store = Arc::new(JsonStore::in_memory());
        let broker = Broker::new();
        let matcher = Arc::new(Matcher::new(
            store.clone() as Arc<dyn Store>,
            broker.alerts().clone(),
        ));
        matcher.attach(&broker);

        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        broker.alerts().subscribe("probe", move |alert: Alert| {
            let sink = sink.clone();
            async move {
                lock(&sink).push(alert);
            }
        });
        (store, broker, captured)
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_carries_every_subscribed_role() {
        let (store, broker, captured) = setup();
        let source = SourceKind::Mangadex;
        store.add_subscription("g1", "r1", source, "uuid-1").await.unwrap();
        store.add_subscription("g1", "r2", source, "uuid-1").await.unwrap();
        store.add_subscription("g1", "r3", source, "other").await.unwrap();
        store.set_title(source, "uuid-1", "Frieren").await.unwrap();

        broker.chapters(source).publish(chapter("uuid-1"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let alerts = lock(&captured);
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.guild_id, "g1");
        assert_eq!(
            alert.role_ids,
            BTreeSet::from(["r1".to_string(), "r2".to_string()])
        );
        assert_eq!(alert.series_title, "Frieren");
        assert_eq!(alert.chapter.label, "Chapter 12");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribed_chapter_produces_nothing() {
        let (store, broker, captured) = setup();
        store
            .add_subscription("g1", "r1", SourceKind::Mangadex, "uuid-1")
            .await
            .unwrap();

        broker.chapters(SourceKind::Mangadex).publish(chapter("uuid-9"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(lock(&captured).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_guild_gets_its_own_alert() {
        let (store, broker, captured) = setup();
        let source = SourceKind::Mangadex;
        store.add_subscription("g1", "r1", source, "uuid-1").await.unwrap();
        store.add_subscription("g2", "r9", source, "uuid-1").await.unwrap();

        broker.chapters(source).publish(chapter("uuid-1"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let alerts = lock(&captured);
        assert_eq!(alerts.len(), 2);
        let mut guilds: Vec<_> = alerts.iter().map(|a| a.guild_id.clone()).collect();
        guilds.sort();
        assert_eq!(guilds, vec!["g1".to_string(), "g2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_series_title_falls_back_to_series_id() {
        let (store, broker, captured) = setup();
        store
            .add_subscription("g1", "r1", SourceKind::Mangadex, "uuid-1")
            .await
            .unwrap();

        broker.chapters(SourceKind::Mangadex).publish(chapter("uuid-1"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(lock(&captured)[0].series_title, "uuid-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_do_not_cross_match() {
        let (store, broker, captured) = setup();
        store
            .add_subscription("g1", "r1", SourceKind::Mangasee, "One-Piece")
            .await
            .unwrap();

        // Same series id published on the other source's topic.
        broker.chapters(SourceKind::Mangadex).publish(chapter("One-Piece"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(lock(&captured).is_empty());
    }
}
