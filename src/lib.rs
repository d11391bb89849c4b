// src/lib.rs

//! Manga release watcher library.

pub mod app;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sources;
pub mod storage;
pub mod utils;

pub use app::App;
pub use error::{AppError, Result};
