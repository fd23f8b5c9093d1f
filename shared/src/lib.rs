//! Shared types for the article import system
//!
//! Holds the data model and contracts that callers of the importer depend on:
//! identifiers, the review status vocabulary, articles and their topic state
//! chains, batch reports, and the normalized record supplied by bibliographic
//! sources.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{
    // Caller -> importer
    ImportRequest, PlacementKind, PlacementRequest,

    // Bibliographic source -> importer
    FetchFailure, FetchOutcome, NormalizedRecord, RelatedReference, RelationKind,
};
