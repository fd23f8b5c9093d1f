//! Request validation
//!
//! Turns a raw `ImportRequest` into checked `BatchOptions`. Every rule that can
//! reject a request lives here so that a bad request fails before any fetch or
//! write happens.

use std::collections::HashSet;

use shared::{
    BoardId, BoardDecision, Cycle, DecisionId, ImportRequest, ImportType, MeetingId, PlacementKind, PlainStatus,
    SourceId, StateValue, TagCode, TopicId, UserId,
};

use crate::error::{ImportError, ImportResult};

/// Board, topic and review cycle a topic import works against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicTarget {
    pub board: BoardId,
    pub topic: TopicId,
    pub cycle: Cycle,
}

/// Checked fast-track destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Published,
    PassedBmReview,
    PassedFullReview,
    BoardManagerAction(PlainStatus),
    OnAgenda(MeetingId),
    FinalBoardDecision(DecisionId),
}

impl Placement {
    /// State recorded for this placement; decisions are dated to the review cycle
    pub fn state_value(self, cycle: Cycle) -> StateValue {
        match self {
            Placement::Published => StateValue::of(PlainStatus::PUBLISHED),
            Placement::PassedBmReview => StateValue::of(PlainStatus::PASSED_BM_REVIEW),
            Placement::PassedFullReview => StateValue::of(PlainStatus::PASSED_FULL_REVIEW),
            Placement::BoardManagerAction(status) => StateValue::Plain { status },
            Placement::OnAgenda(meeting) => StateValue::OnAgenda { meeting },
            Placement::FinalBoardDecision(decision) => StateValue::FinalBoardDecision {
                decision: BoardDecision { decision, meeting_date: cycle, discussed: false },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastTrack {
    pub placement: Placement,
    pub comments: Option<String>,
}

/// Annotations an internal import puts on each article
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalAnnotations {
    pub tags: Vec<String>,
    pub comment: Option<String>,
}

/// Validated batch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub import_type: ImportType,
    /// Requested identifiers, duplicates removed, first-seen order kept
    pub article_ids: Vec<SourceId>,
    pub target: Option<TopicTarget>,
    pub user: Option<UserId>,
    pub comment: Option<String>,
    pub mgr_comment: Option<String>,
    pub override_not_list: bool,
    pub fast_track: Option<FastTrack>,
    pub special_search: bool,
    pub core_journals_search: bool,
    pub hi_priority: bool,
    pub test_mode: bool,
    pub full_text: Option<String>,
    pub internal: Option<InternalAnnotations>,
}

impl BatchOptions {
    pub fn from_request(request: &ImportRequest) -> ImportResult<Self> {
        let import_type = request.effective_import_type();
        let article_ids = dedupe(&request.article_ids);
        if article_ids.is_empty() {
            return Err(ImportError::validation("No articles specified"));
        }

        let target = if import_type.needs_topic() {
            let topic = request
                .topic
                .ok_or_else(|| ImportError::validation(format!("Topic is required for {import_type} imports")))?;
            let board = request
                .board
                .ok_or_else(|| ImportError::validation("Board must be specified for topic-specific import"))?;
            let cycle = request
                .cycle
                .ok_or_else(|| ImportError::validation("Cycle must be specified for topic-specific import"))?;
            Some(TopicTarget { board, topic, cycle })
        } else {
            if request.topic.is_some() {
                return Err(ImportError::validation(format!("{import_type} imports do not take a topic")));
            }
            None
        };

        let wants_fast_track = request.fast_track || import_type == ImportType::FastTrack;
        let fast_track = match (&request.placement, wants_fast_track) {
            (Some(placement), true) => {
                if target.is_none() {
                    return Err(ImportError::validation("Fast-track imports require a topic"));
                }
                Some(FastTrack { placement: check_placement(placement)?, comments: clean(&placement.comments) })
            }
            (None, true) => return Err(ImportError::validation("Fast-track imports require a placement")),
            (Some(_), false) => {
                return Err(ImportError::validation("Placement given for an import that is not fast-tracked"))
            }
            (None, false) => None,
        };

        let full_text = clean(&request.full_text);
        if full_text.is_some() && article_ids.len() > 1 {
            return Err(ImportError::validation("A full-text document can only be attached to a single article"));
        }

        let internal_tags = dedupe_text(&request.internal_tags);
        let internal_comment = clean(&request.internal_comment);
        let internal = if import_type == ImportType::Internal {
            if internal_tags.is_empty() && internal_comment.is_none() {
                return Err(ImportError::validation("Internal imports require tags or a comment"));
            }
            Some(InternalAnnotations { tags: internal_tags, comment: internal_comment })
        } else {
            if !internal_tags.is_empty() || internal_comment.is_some() {
                return Err(ImportError::validation("Internal tags and comments are only accepted for internal imports"));
            }
            None
        };

        Ok(Self {
            import_type,
            article_ids,
            target,
            user: request.user,
            comment: clean(&request.import_comments),
            mgr_comment: clean(&request.mgr_comment),
            override_not_list: request.override_not_list,
            fast_track,
            special_search: request.special_search || import_type == ImportType::SpecialSearch,
            core_journals_search: request.core_journals_search,
            hi_priority: request.hi_priority,
            test_mode: request.test_mode,
            full_text,
            internal,
        })
    }

    /// Tags attached to each new article/topic pairing, once per batch
    pub fn tags(&self) -> Vec<TagCode> {
        let mut tags = Vec::new();
        if self.special_search {
            tags.push(TagCode::SpecialSearch);
        }
        if self.core_journals_search {
            tags.push(TagCode::CoreJournals);
        }
        if self.hi_priority {
            tags.push(TagCode::HighPriority);
        }
        if self.fast_track.is_some() {
            tags.push(TagCode::FastTrack);
        }
        tags
    }
}

fn check_placement(request: &shared::PlacementRequest) -> ImportResult<Placement> {
    let placement = match request.placement {
        PlacementKind::Published => Placement::Published,
        PlacementKind::PassedBmReview => Placement::PassedBmReview,
        PlacementKind::PassedFullReview => Placement::PassedFullReview,
        PlacementKind::Bma => {
            let code = request
                .bma_disposition
                .ok_or_else(|| ImportError::validation("Board manager action placement requires a disposition"))?;
            if !code.is_board_manager_action() {
                return Err(ImportError::validation(format!("{code} is not a board manager action")));
            }
            Placement::BoardManagerAction(PlainStatus::new(code)?)
        }
        PlacementKind::OnAgenda => {
            let meeting = request
                .meeting
                .ok_or_else(|| ImportError::validation("Meeting is required for on-agenda placement"))?;
            Placement::OnAgenda(meeting)
        }
        PlacementKind::FinalBoardDecision => {
            let decision = request
                .decision
                .ok_or_else(|| ImportError::validation("Decision is required for final board decision placement"))?;
            Placement::FinalBoardDecision(decision)
        }
    };
    Ok(placement)
}

fn dedupe(ids: &[SourceId]) -> Vec<SourceId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert((*id).clone())).cloned().collect()
}

fn dedupe_text(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}

fn clean(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
