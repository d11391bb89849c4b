//! Event-driven plumbing shared by every source.
//!
//! - `gate`: readiness gates consumers signal and producers await
//! - `topic`: typed in-process publish/subscribe topics
//! - `dedup`: bounded seen-chapter window
//! - `scheduler`: shared timer loop for one-shot tasks
//! - `scraper`: per-source polling lifecycle
//! - `status`: per-source health board and pulses

pub mod dedup;
pub mod gate;
pub mod scheduler;
pub mod scraper;
pub mod status;
pub mod topic;

pub use dedup::DedupWindow;
pub use gate::{GATE_NOTIFIER, GATE_STORE, GateSet, ReadyGate};
pub use scheduler::Scheduler;
pub use scraper::Scraper;
pub use status::{SourceHealth, SourceStatus, StatusBoard, StatusPulse};
pub use topic::{Broker, Topic};
