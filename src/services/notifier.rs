// src/services/notifier.rs

//! Alert rendering and delivery.
//!
//! The dispatcher consumes alerts from the alert topic, groups each alert's
//! roles by the channel they are wired to, and hands one rendered message
//! per channel to the configured [`Notifier`] backend. Roles without a
//! channel are skipped with a warning rather than failing the alert.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Alert;
use crate::pipeline::topic::Broker;
use crate::storage::Store;

/// Delivery backend for rendered alert messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message to a channel of a guild.
    async fn notify(&self, guild_id: &str, channel_id: &str, message: &str) -> Result<()>;
}

/// Backend that writes every message to the log. Used when no chat
/// integration is configured, and handy in development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, guild_id: &str, channel_id: &str, message: &str) -> Result<()> {
        log::info!("[guild {guild_id} / channel {channel_id}] {message}");
        Ok(())
    }
}

/// Consumes alerts and delivers one message per target channel.
pub struct AlertDispatcher {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Subscribe to the alert topic.
    pub fn attach(self: &Arc<Self>, broker: &Broker) {
        let dispatcher = Arc::clone(self);
        broker.alerts().subscribe("notifier", move |alert| {
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher.dispatch(alert).await;
            }
        });
    }

    async fn dispatch(&self, alert: Alert) {
        let mut by_channel: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for role_id in &alert.role_ids {
            match self.store.channel(&alert.guild_id, role_id).await {
                Ok(Some(channel_id)) => {
                    by_channel.entry(channel_id).or_default().push(role_id.clone());
                }
                Ok(None) => {
                    log::warn!(
                        "Skipping role {role_id} in guild {}: no delivery channel configured",
                        alert.guild_id
                    );
                }
                Err(err) => {
                    log::error!(
                        "Skipping role {role_id} in guild {}: channel lookup failed: {err}",
                        alert.guild_id
                    );
                }
            }
        }
        for (channel_id, role_ids) in by_channel {
            let message = render_message(&alert, &role_ids);
            if let Err(err) = self
                .notifier
                .notify(&alert.guild_id, &channel_id, &message)
                .await
            {
                log::error!(
                    "Delivery to channel {channel_id} in guild {} failed: {err}",
                    alert.guild_id
                );
            }
        }
    }
}

fn render_message(alert: &Alert, role_ids: &[String]) -> String {
    let mentions = role_ids
        .iter()
        .map(|id| format!("<@&{id}>"))
        .collect::<Vec<_>>()
        .join(" ");
    let body = alert.chapter.format("{label} is out: {link}");
    format!("{mentions} New {} chapter! {body}", alert.series_title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chapter, SourceKind};
    use crate::storage::JsonStore;
    use crate::utils::lock;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(String, String, String)> {
            lock(&self.sent).clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, guild_id: &str, channel_id: &str, message: &str) -> Result<()> {
            lock(&self.sent).push((
                guild_id.to_string(),
                channel_id.to_string(),
                message.to_string(),
            ));
            Ok(())
        }
    }

    fn alert(roles: &[&str]) -> Alert {
        Alert {
            guild_id: "g1".to_string(),
            role_ids: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
            series_title: "Frieren".to_string(),
            chapter: Chapter {
                source: SourceKind::Mangadex,
                series_id: "uuid-1".to_string(),
                label: "Chapter 121".to_string(),
                link: "https://example.com/c/121".to_string(),
                pages: Some(18),
                key: "c121".to_string(),
            },
        }
    }

    fn setup() -> (Arc<JsonStore>, Arc<RecordingNotifier>, Arc<AlertDispatcher>) {
        let store = Arc::new(JsonStore::in_memory());
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Arc::new(AlertDispatcher::new(
            store.clone() as Arc<dyn Store>,
            notifier.clone() as Arc<dyn Notifier>,
        ));
        (store, notifier, dispatcher)
    }

    #[tokio::test]
    async fn test_roles_sharing_a_channel_get_one_message() {
        let (store, notifier, dispatcher) = setup();
        store.set_channel("g1", "r1", "c1").await.unwrap();
        store.set_channel("g1", "r2", "c1").await.unwrap();
        store.set_channel("g1", "r3", "c2").await.unwrap();

        dispatcher.dispatch(alert(&["r1", "r2", "r3"])).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        let (_, channel, message) = &sent[0];
        assert_eq!(channel, "c1");
        assert!(message.contains("<@&r1>"));
        assert!(message.contains("<@&r2>"));
        assert!(!message.contains("<@&r3>"));
        assert_eq!(sent[1].1, "c2");
    }

    #[tokio::test]
    async fn test_role_without_channel_is_skipped() {
        let (store, notifier, dispatcher) = setup();
        store.set_channel("g1", "r1", "c1").await.unwrap();

        dispatcher.dispatch(alert(&["r1", "r2"])).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.contains("<@&r1>"));
        assert!(!sent[0].2.contains("<@&r2>"));
    }

    #[tokio::test]
    async fn test_message_mentions_title_label_and_link() {
        let (store, notifier, dispatcher) = setup();
        store.set_channel("g1", "r1", "c1").await.unwrap();

        dispatcher.dispatch(alert(&["r1"])).await;

        let message = &notifier.sent()[0].2;
        assert!(message.contains("Frieren"));
        assert!(message.contains("Chapter 121"));
        assert!(message.contains("https://example.com/c/121"));
    }

    #[tokio::test]
    async fn test_alert_with_no_channels_sends_nothing() {
        let (_store, notifier, dispatcher) = setup();

        dispatcher.dispatch(alert(&["r1"])).await;

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatcher_consumes_the_alert_topic() {
        let (store, notifier, dispatcher) = setup();
        store.set_channel("g1", "r1", "c1").await.unwrap();
        let broker = Broker::new();
        dispatcher.attach(&broker);

        broker.alerts().publish(alert(&["r1"]));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "g1");
        assert_eq!(sent[0].1, "c1");
    }
}
