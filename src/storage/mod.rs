//! Storage abstractions for watcher state.
//!
//! The store holds everything that must survive a restart: which channel a
//! role is notified in, which series each (guild, role) pair subscribes to,
//! cached series titles, alias lookups, and the per-source enabled flags.
//! Seen-chapter state is not stored; the dedup window is rebuilt by
//! re-seeding on startup.

pub mod local;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SourceKind;

// Re-export for convenience
pub use local::JsonStore;

/// Trait for watcher state backends.
#[async_trait]
pub trait Store: Send + Sync {
    /// Channel a role's alerts are delivered to, if configured.
    async fn channel(&self, guild_id: &str, role_id: &str) -> Result<Option<String>>;

    /// Set the delivery channel for a role.
    async fn set_channel(&self, guild_id: &str, role_id: &str, channel_id: &str) -> Result<()>;

    /// Subscribe a role to a series. Returns false if it already was.
    async fn add_subscription(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
        series_id: &str,
    ) -> Result<bool>;

    /// Unsubscribe a role from a series. Returns false if it was not
    /// subscribed.
    async fn remove_subscription(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
        series_id: &str,
    ) -> Result<bool>;

    /// Every series id a role subscribes to on one source.
    async fn subscriptions(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
    ) -> Result<BTreeSet<String>>;

    /// Whether a role subscribes to a series.
    async fn is_subscribed(
        &self,
        guild_id: &str,
        role_id: &str,
        source: SourceKind,
        series_id: &str,
    ) -> Result<bool>;

    /// Every guild with stored state.
    async fn guilds(&self) -> Result<Vec<String>>;

    /// Every role with stored state in one guild.
    async fn roles(&self, guild_id: &str) -> Result<Vec<String>>;

    /// Cached display title of a series.
    async fn title(&self, source: SourceKind, series_id: &str) -> Result<Option<String>>;

    /// Cache the display title of a series.
    async fn set_title(&self, source: SourceKind, series_id: &str, title: &str) -> Result<()>;

    /// Resolve an alias (normalized series name) to a series id.
    async fn alias(&self, source: SourceKind, name: &str) -> Result<Option<String>>;

    /// Record an alias for a series.
    async fn set_alias(&self, source: SourceKind, name: &str, series_id: &str) -> Result<()>;

    /// Persisted enabled flag of a source; `None` if never set.
    async fn source_enabled(&self, source: SourceKind) -> Result<Option<bool>>;

    /// Persist the enabled flag of a source.
    async fn set_source_enabled(&self, source: SourceKind, enabled: bool) -> Result<()>;
}
