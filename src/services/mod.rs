//! Service layer for the watcher application.
//!
//! This module contains the business logic for:
//! - Matching chapter events against subscriptions (`Matcher`)
//! - Rendering and delivering alerts (`AlertDispatcher`)

mod matcher;
mod notifier;

pub use matcher::Matcher;
pub use notifier::{AlertDispatcher, LogNotifier, Notifier};
