//! Service implementations
//!
//! This module contains real implementations of the importer's service traits:
//! the PubMed E-utilities connector and the JSON-file article store.

pub mod pubmed;
pub mod pubmed_xml;
pub mod retry;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use pubmed::RealPubmedSource;
pub use retry::retry_with_backoff;
pub use store::{BoardRecord, JournalExclusion, JournalRecord, RealArticleStore};
