//! Import request contract

use serde::{Deserialize, Serialize};

use crate::types::{BoardId, Cycle, DecisionId, ImportType, MeetingId, SourceId, StatusCode, TopicId, UserId};

/// Where a fast-tracked article should land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    Published,
    PassedBmReview,
    PassedFullReview,
    Bma,
    OnAgenda,
    FinalBoardDecision,
}

/// Fast-track placement as submitted; checked before any processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub placement: PlacementKind,
    /// Required for `on_agenda`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingId>,
    /// Required for `final_board_decision`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionId>,
    /// Required for `bma`; one of the board manager sub-statuses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bma_disposition: Option<StatusCode>,
    /// Attached to the last state of the fast-track sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl PlacementRequest {
    pub fn new(placement: PlacementKind) -> Self {
        Self { placement, meeting: None, decision: None, bma_disposition: None, comments: None }
    }
}

/// Everything a caller can ask of one import batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportRequest {
    pub article_ids: Vec<SourceId>,
    /// Derived from the other options when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_type: Option<ImportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<TopicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Cycle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgr_comment: Option<String>,
    #[serde(default)]
    pub override_not_list: bool,
    #[serde(default)]
    pub fast_track: bool,
    #[serde(default)]
    pub special_search: bool,
    #[serde(default)]
    pub core_journals_search: bool,
    #[serde(default)]
    pub hi_priority: bool,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default)]
    pub internal_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_comment: Option<String>,
}

impl ImportRequest {
    /// Topic import for a board
    pub fn for_topic(article_ids: Vec<SourceId>, board: BoardId, topic: TopicId, cycle: Cycle) -> Self {
        Self {
            article_ids,
            board: Some(board),
            topic: Some(topic),
            cycle: Some(cycle),
            ..Self::default()
        }
    }

    /// Topic-less refresh of stored bibliographic data
    pub fn data_refresh(article_ids: Vec<SourceId>, comment: impl Into<String>) -> Self {
        Self {
            article_ids,
            import_type: Some(ImportType::DataRefresh),
            import_comments: Some(comment.into()),
            ..Self::default()
        }
    }

    /// Import type as given, or derived from the flags and topic
    pub fn effective_import_type(&self) -> ImportType {
        if let Some(import_type) = self.import_type {
            return import_type;
        }
        if self.topic.is_none() {
            ImportType::DataRefresh
        } else if self.fast_track {
            ImportType::FastTrack
        } else if self.special_search {
            ImportType::SpecialSearch
        } else {
            ImportType::Regular
        }
    }
}
