//! Import batches and their audit actions
//!
//! A `Batch` is the stable report consumed by notification and reporting
//! collaborators. Actions are kept in emission order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ArticleId, BatchId, BoardId, Cycle, SourceId, TopicId, UserId};
use crate::errors::SharedError;

/// Kind of import a batch performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    Regular,
    FastTrack,
    SpecialSearch,
    DataRefresh,
    Internal,
}

impl ImportType {
    /// Single-letter code used in stored batch records
    pub fn code(self) -> char {
        match self {
            ImportType::Regular => 'R',
            ImportType::FastTrack => 'F',
            ImportType::SpecialSearch => 'S',
            ImportType::DataRefresh => 'D',
            ImportType::Internal => 'I',
        }
    }

    /// Whether batches of this kind work against a board topic
    pub fn needs_topic(self) -> bool {
        !matches!(self, ImportType::DataRefresh | ImportType::Internal)
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportType::Regular => "regular",
            ImportType::FastTrack => "fast-track",
            ImportType::SpecialSearch => "special-search",
            ImportType::DataRefresh => "data-refresh",
            ImportType::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl FromStr for ImportType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "r" | "regular" => Ok(ImportType::Regular),
            "f" | "fast-track" | "fast_track" => Ok(ImportType::FastTrack),
            "s" | "special-search" | "special_search" => Ok(ImportType::SpecialSearch),
            "d" | "data-refresh" | "data_refresh" => Ok(ImportType::DataRefresh),
            "i" | "internal" => Ok(ImportType::Internal),
            _ => Err(SharedError::UnknownImportType { code: s.to_string() }),
        }
    }
}

/// Audit classification of one processing step for an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Imported,
    Duplicate,
    TopicAdded,
    ReviewReady,
    NotListed,
    Replaced,
    Error,
}

impl Disposition {
    pub fn text_id(self) -> &'static str {
        match self {
            Disposition::Imported => "imported",
            Disposition::Duplicate => "duplicate",
            Disposition::TopicAdded => "topic_added",
            Disposition::ReviewReady => "review_ready",
            Disposition::NotListed => "not_listed",
            Disposition::Replaced => "replaced",
            Disposition::Error => "error",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text_id())
    }
}

impl FromStr for Disposition {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "imported" => Ok(Disposition::Imported),
            "duplicate" => Ok(Disposition::Duplicate),
            "topic_added" => Ok(Disposition::TopicAdded),
            "review_ready" => Ok(Disposition::ReviewReady),
            "not_listed" => Ok(Disposition::NotListed),
            "replaced" => Ok(Disposition::Replaced),
            "error" => Ok(Disposition::Error),
            other => Err(SharedError::UnknownDisposition { code: other.to_string() }),
        }
    }
}

/// One audit record inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub source_id: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<ArticleId>,
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Execution record of one import request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub import_type: ImportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<TopicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Cycle>,
    pub imported: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    pub not_list_override: bool,
    pub test_mode: bool,
    pub requested_ids: Vec<SourceId>,
    pub article_count: usize,
    pub success: bool,
    pub actions: Vec<Action>,
    pub followup_ids: Vec<SourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl Batch {
    /// Source ids that received the given disposition, in action order
    pub fn ids_with(&self, disposition: Disposition) -> Vec<&SourceId> {
        self.actions
            .iter()
            .filter(|a| a.disposition == disposition)
            .map(|a| &a.source_id)
            .collect()
    }

    /// Dispositions emitted for one identifier, in order
    pub fn dispositions_for(&self, source_id: &SourceId) -> Vec<Disposition> {
        self.actions
            .iter()
            .filter(|a| &a.source_id == source_id)
            .map(|a| a.disposition)
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.actions.iter().filter(|a| a.disposition == Disposition::Error).count()
    }
}
