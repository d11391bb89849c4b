// src/error.rs

//! Unified error handling for the watcher application.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Shared timer loop failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Fetching from a source failed
    #[error("Fetch error for {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// Parsing a source payload failed
    #[error("Parse error for {source_id}: {message}")]
    Parse { source_id: String, message: String },

    /// Registering something under an id that is already taken
    #[error("Duplicate {entity} '{id}'")]
    Duplicate { entity: String, id: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a scheduler error.
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::Scheduler(message.into())
    }

    /// Create a fetch error tagged with the source it came from.
    pub fn fetch(source: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_id: source.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a parse error tagged with the source it came from.
    pub fn parse(source: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Parse {
            source_id: source.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a duplicate-registration error.
    pub fn duplicate(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity: entity.into(),
            id: id.into(),
        }
    }
}
