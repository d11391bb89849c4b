//! JSON-file storage implementation.
//!
//! Keeps the whole state in memory behind a mutex and writes the JSON
//! document through on every mutation. Writes are atomic (temp file, then
//! rename), so a crash mid-write leaves the previous state intact. A
//! missing file on open is treated as an empty store.
//!
//! ## Document Layout
//!
//! ```text
//! {
//!   "guilds":  { <guild>: { "roles": { <role>: { channel, subscriptions } } } },
//!   "titles":  { <source>: { <series id>: <title> } },
//!   "aliases": { <source>: { <normalized name>: <series id> } },
//!   "sources": { <source>: { "enabled": bool } }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::SourceKind;
use crate::storage::Store;
use crate::utils::normalize_title;

/// JSON-file storage backend with an in-memory mode for tests.
pub struct JsonStore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    guilds: BTreeMap<String, GuildRecord>,

    #[serde(default)]
    titles: BTreeMap<SourceKind, BTreeMap<String, String>>,

    #[serde(default)]
    aliases: BTreeMap<SourceKind, BTreeMap<String, String>>,

    #[serde(default)]
    sources: BTreeMap<SourceKind, SourceRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GuildRecord {
    #[serde(default)]
    roles: BTreeMap<String, RoleRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoleRecord {
    #[serde(default)]
    channel: Option<String>,

    #[serde(default)]
    subscriptions: BTreeMap<SourceKind, BTreeSet<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SourceRecord {
    enabled: bool,
}

impl JsonStore {
    /// Open a store backed by a JSON file, creating state from scratch if
    /// the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No store file at {path:?}, starting empty");
                StoreData::default()
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    /// Create a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(StoreData::default()),
        }
    }

    /// Write the document atomically (write to temp, then rename).
    async fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Lock, mutate, persist.
    async fn update<R>(&self, mutate: impl FnOnce(&mut StoreData) -> R) -> Result<R> {
        let mut data = self.data.lock().await;
        let result = mutate(&mut data);
        self.persist(&data).await?;
        Ok(result)
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn channel(&self, guild_id: &str, role_id: &str) -> Result<Option<String>> {
        let data = self.data.lock().await;
        Ok(data
            .guilds
            .get(guild_id)
            .and_then(|g| g.roles.get(role_id))
            .and_then(|r| r.channel.clone()))
    }

    async fn set_channel(&self, guild_id: &str, role_id: &str, channel_id: &str) -> Result<()> {
        self.update(|data| {
            let role = data
                .guilds
                .entry(guild_id.to_string())
                .or_default()
                .roles
                .entry(role_id.to_string())
                .or_default();
            role.channel = Some(channel_id.to_string());
        })
        .await
    }

    async fn add_subscription(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
        series_id: &str,
    ) -> Result<bool> {
        self.update(|data| {
            data.guilds
                .entry(guild_id.to_string())
                .or_default()
                .roles
                .entry(role_id.to_string())
                .or_default()
                .subscriptions
                .entry(source)
                .or_default()
                .insert(series_id.to_string())
        })
        .await
    }

    async fn remove_subscription(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
        series_id: &str,
    ) -> Result<bool> {
        self.update(|data| {
            data.guilds
                .get_mut(guild_id)
                .and_then(|g| g.roles.get_mut(role_id))
                .and_then(|r| r.subscriptions.get_mut(&source))
                .is_some_and(|subs| subs.remove(series_id))
        })
        .await
    }

    async fn subscriptions(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
    ) -> Result<BTreeSet<String>> {
        let data = self.data.lock().await;
        Ok(data
            .guilds
            .get(guild_id)
            .and_then(|g| g.roles.get(role_id))
            .and_then(|r| r.subscriptions.get(&source))
            .cloned()
            .unwrap_or_default())
    }

    async fn is_subscribed(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
        series_id: &str,
    ) -> Result<bool> {
        let data = self.data.lock().await;
        Ok(data
            .guilds
            .get(guild_id)
            .and_then(|g| g.roles.get(role_id))
            .and_then(|r| r.subscriptions.get(&source))
            .is_some_and(|subs| subs.contains(series_id)))
    }

    async fn guilds(&self) -> Result<Vec<String>> {
        let data = self.data.lock().await;
        Ok(data.guilds.keys().cloned().collect())
    }

    async fn roles(&self, guild_id: &str) -> Result<Vec<String>> {
        let data = self.data.lock().await;
        Ok(data
            .guilds
            .get(guild_id)
            .map(|g| g.roles.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn title(&self, source: SourceKind, series_id: &str) -> Result<Option<String>> {
        let data = self.data.lock().await;
        Ok(data
            .titles
            .get(&source)
            .and_then(|m| m.get(series_id))
            .cloned())
    }

    async fn set_title(&self, source: SourceKind, series_id: &str, title: &str) -> Result<()> {
        self.update(|data| {
            data.titles
                .entry(source)
                .or_default()
                .insert(series_id.to_string(), title.to_string());
        })
        .await
    }

    async fn alias(&self, source: SourceKind, name: &str) -> Result<Option<String>> {
        let key = normalize_title(name);
        let data = self.data.lock().await;
        Ok(data.aliases.get(&source).and_then(|m| m.get(&key)).cloned())
    }

    async fn set_alias(&self, source: SourceKind, name: &str, series_id: &str) -> Result<()> {
        let key = normalize_title(name);
        self.update(|data| {
            data.aliases
                .entry(source)
                .or_default()
                .insert(key, series_id.to_string());
        })
        .await
    }

    async fn source_enabled(&self, source: SourceKind) -> Result<Option<bool>> {
        let data = self.data.lock().await;
        Ok(data.sources.get(&source).map(|s| s.enabled))
    }

    async fn set_source_enabled(&self, source: SourceKind, enabled: bool) -> Result<()> {
        self.update(|data| {
            data.sources.entry(source).or_default().enabled = enabled;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::open(tmp.path().join("state.json")).await.unwrap();
        assert!(store.guilds().await.unwrap().is_empty());
        assert_eq!(store.source_enabled(SourceKind::Mangadex).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscription_round_trip() {
        let store = JsonStore::in_memory();

        assert!(store
            .add_subscription("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());
        // Subscribing twice is a no-op.
        assert!(!store
            .add_subscription("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());

        assert!(store
            .is_subscribed("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());
        let subs = store
            .subscriptions("g1", "r1", SourceKind::Mangadex)
            .await
            .unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs.contains("series-a"));

        assert!(store
            .remove_subscription("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());
        assert!(!store
            .remove_subscription("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());
        assert!(!store
            .is_subscribed("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_subscriptions_scoped_by_source() {
        let store = JsonStore::in_memory();
        store
            .add_subscription("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap();

        assert!(!store
            .is_subscribed("g1", "r1", SourceKind::Mangasee, "series-a")
            .await
            .unwrap());
        assert!(store
            .subscriptions("g1", "r1", SourceKind::Mangasee)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_channel_set_and_get() {
        let store = JsonStore::in_memory();
        assert_eq!(store.channel("g1", "r1").await.unwrap(), None);

        store.set_channel("g1", "r1", "chan-9").await.unwrap();
        assert_eq!(
            store.channel("g1", "r1").await.unwrap(),
            Some("chan-9".to_string())
        );

        // Re-pointing a role replaces its channel.
        store.set_channel("g1", "r1", "chan-10").await.unwrap();
        assert_eq!(
            store.channel("g1", "r1").await.unwrap(),
            Some("chan-10".to_string())
        );
    }

    #[tokio::test]
    async fn test_guild_and_role_enumeration() {
        let store = JsonStore::in_memory();
        store.set_channel("g1", "r1", "c1").await.unwrap();
        store.set_channel("g1", "r2", "c2").await.unwrap();
        store.set_channel("g2", "r1", "c3").await.unwrap();

        assert_eq!(store.guilds().await.unwrap(), vec!["g1", "g2"]);
        assert_eq!(store.roles("g1").await.unwrap(), vec!["r1", "r2"]);
        assert_eq!(store.roles("g2").await.unwrap(), vec!["r1"]);
        assert!(store.roles("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_titles() {
        let store = JsonStore::in_memory();
        assert_eq!(store.title(SourceKind::Mangadex, "s1").await.unwrap(), None);

        store
            .set_title(SourceKind::Mangadex, "s1", "One-Punch Man")
            .await
            .unwrap();
        assert_eq!(
            store.title(SourceKind::Mangadex, "s1").await.unwrap(),
            Some("One-Punch Man".to_string())
        );
        // Source-scoped.
        assert_eq!(store.title(SourceKind::Mangasee, "s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_alias_lookup_is_normalized() {
        let store = JsonStore::in_memory();
        store
            .set_alias(SourceKind::Mangasee, "One-Punch Man", "Onepunch-Man")
            .await
            .unwrap();

        assert_eq!(
            store
                .alias(SourceKind::Mangasee, "one punch  MAN")
                .await
                .unwrap(),
            Some("Onepunch-Man".to_string())
        );
        assert_eq!(
            store.alias(SourceKind::Mangasee, "other title").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_enabled_flags() {
        let store = JsonStore::in_memory();
        assert_eq!(store.source_enabled(SourceKind::Mangadex).await.unwrap(), None);

        store
            .set_source_enabled(SourceKind::Mangadex, true)
            .await
            .unwrap();
        assert_eq!(
            store.source_enabled(SourceKind::Mangadex).await.unwrap(),
            Some(true)
        );

        store
            .set_source_enabled(SourceKind::Mangadex, false)
            .await
            .unwrap();
        assert_eq!(
            store.source_enabled(SourceKind::Mangadex).await.unwrap(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        {
            let store = JsonStore::open(&path).await.unwrap();
            store
                .add_subscription("g1", "r1", SourceKind::Mangadex, "series-a")
                .await
                .unwrap();
            store.set_channel("g1", "r1", "chan-1").await.unwrap();
            store
                .set_source_enabled(SourceKind::Mangasee, true)
                .await
                .unwrap();
        }

        let store = JsonStore::open(&path).await.unwrap();
        assert!(store
            .is_subscribed("g1", "r1", SourceKind::Mangadex, "series-a")
            .await
            .unwrap());
        assert_eq!(
            store.channel("g1", "r1").await.unwrap(),
            Some("chan-1".to_string())
        );
        assert_eq!(
            store.source_enabled(SourceKind::Mangasee).await.unwrap(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let store = JsonStore::open(&path).await.unwrap();
        store.set_channel("g1", "r1", "c1").await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
