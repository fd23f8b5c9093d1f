//! Contracts exchanged with the importer's collaborators
//!
//! `request` is what callers hand to the batch orchestrator; `record` is what
//! a bibliographic source returns for each requested identifier.

pub mod record;
pub mod request;

pub use record::*;
pub use request::*;
