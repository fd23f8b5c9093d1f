//! Article import library for the editorial review system
//!
//! This library turns requests to import PubMed articles into audited import
//! batches: it fetches and normalizes records, decides per article whether it
//! is new, a duplicate, excluded by a board's journal list or due for review,
//! and appends the resulting states to each article's per-topic history.

pub mod config;
pub mod core;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use crate::core::{classify, BatchOptions, Classification, NewState, TopicLedger};
pub use config::ImporterConfig;
pub use error::{ImportError, ImportResult};
pub use jobs::{DropReport, RefreshReport, REFRESH_COMMENT};
pub use orchestrator::{BatchOrchestrator, FetchSettings};
pub use traits::{ArticleRepository, JournalRegistry, RecordSource, StateLedger};
