// src/models/mod.rs

//! Domain models for the watcher application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod alert;
mod chapter;
mod config;
mod source;

// Re-export all public types
pub use alert::Alert;
pub use chapter::{Chapter, Series};
pub use config::{
    Config, DedupConfig, HttpConfig, SchedulerConfig, SourceConfig, SourcesConfig, StoreConfig,
};
pub use source::SourceKind;
