//! Core business logic modules
//!
//! This module contains pure business logic with no I/O dependencies.
//! All functions are deterministic and easily testable.

pub mod classifier;
pub mod followup;
pub mod ledger;
pub mod options;
pub mod reconcile;
pub mod report;

pub use classifier::{classify, ArticleChange, ArticleWrite, Classification, Subject, TopicChange, TopicSnapshot};
pub use followup::FollowupCollector;
pub use ledger::{NewState, TopicLedger};
pub use options::{BatchOptions, Placement, TopicTarget};
pub use reconcile::{reconcile, Reconciled};
pub use report::BatchLog;
