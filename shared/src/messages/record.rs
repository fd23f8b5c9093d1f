//! Normalized records returned by a bibliographic source

use serde::{Deserialize, Serialize};

use crate::types::{ArticleMetadata, Author, JournalId, PubDate, SourceId};

/// Relationship a record declares to another record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    RetractionOf,
    RetractionIn,
    ErratumFor,
    ErratumIn,
    UpdateOf,
    UpdateIn,
    RepublishedFrom,
    RepublishedIn,
    RetractedAndRepublishedFrom,
    RetractedAndRepublishedIn,
    CorrectedAndRepublishedFrom,
    CorrectedAndRepublishedIn,
    ExpressionOfConcernFor,
    ExpressionOfConcernIn,
    CommentOn,
    CommentIn,
    Other(String),
}

impl RelationKind {
    /// Map the source's relation attribute onto a kind
    pub fn from_ref_type(ref_type: &str) -> Self {
        match ref_type.trim() {
            "RetractionOf" => RelationKind::RetractionOf,
            "RetractionIn" => RelationKind::RetractionIn,
            "ErratumFor" => RelationKind::ErratumFor,
            "ErratumIn" => RelationKind::ErratumIn,
            "UpdateOf" => RelationKind::UpdateOf,
            "UpdateIn" => RelationKind::UpdateIn,
            "RepublishedFrom" => RelationKind::RepublishedFrom,
            "RepublishedIn" => RelationKind::RepublishedIn,
            "RetractedandRepublishedFrom" | "RetractedAndRepublishedFrom" => {
                RelationKind::RetractedAndRepublishedFrom
            }
            "RetractedandRepublishedIn" | "RetractedAndRepublishedIn" => RelationKind::RetractedAndRepublishedIn,
            "CorrectedandRepublishedFrom" | "CorrectedAndRepublishedFrom" => {
                RelationKind::CorrectedAndRepublishedFrom
            }
            "CorrectedandRepublishedIn" | "CorrectedAndRepublishedIn" => RelationKind::CorrectedAndRepublishedIn,
            "ExpressionOfConcernFor" => RelationKind::ExpressionOfConcernFor,
            "ExpressionOfConcernIn" => RelationKind::ExpressionOfConcernIn,
            "CommentOn" => RelationKind::CommentOn,
            "CommentIn" => RelationKind::CommentIn,
            other => RelationKind::Other(other.to_string()),
        }
    }

    /// Retractions, errata and corrected republications; not comments
    pub fn is_correction_or_retraction(&self) -> bool {
        matches!(
            self,
            RelationKind::RetractionOf
                | RelationKind::RetractionIn
                | RelationKind::ErratumFor
                | RelationKind::ErratumIn
                | RelationKind::UpdateOf
                | RelationKind::UpdateIn
                | RelationKind::RetractedAndRepublishedFrom
                | RelationKind::RetractedAndRepublishedIn
                | RelationKind::CorrectedAndRepublishedFrom
                | RelationKind::CorrectedAndRepublishedIn
        )
    }
}

/// A reference from one record to another record in the same source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedReference {
    pub source_id: SourceId,
    pub relation: RelationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

/// Normalized fields for one fetched identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source_id: SourceId,
    pub metadata: ArticleMetadata,
    #[serde(default)]
    pub related: Vec<RelatedReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_status: Option<String>,
}

impl NormalizedRecord {
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn authors(&self) -> &[Author] {
        &self.metadata.authors
    }

    pub fn journal_id(&self) -> Option<&JournalId> {
        self.metadata.journal_id.as_ref()
    }

    pub fn journal_title(&self) -> Option<&str> {
        self.metadata.journal_title.as_deref()
    }

    pub fn pub_date(&self) -> &PubDate {
        &self.metadata.pub_date
    }

    /// All referenced identifiers, in record order
    pub fn related_ids(&self) -> Vec<&SourceId> {
        self.related.iter().map(|r| &r.source_id).collect()
    }
}

/// Why an identifier could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub source_id: SourceId,
    pub reason: String,
}

/// Per-identifier fetch result; a batch can mix successes and failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchOutcome {
    Found(NormalizedRecord),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn failed(source_id: SourceId, reason: impl Into<String>) -> Self {
        FetchOutcome::Failed(FetchFailure { source_id, reason: reason.into() })
    }

    pub fn source_id(&self) -> &SourceId {
        match self {
            FetchOutcome::Found(record) => &record.source_id,
            FetchOutcome::Failed(failure) => &failure.source_id,
        }
    }
}
