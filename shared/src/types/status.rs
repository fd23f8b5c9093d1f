//! Review status vocabulary and per-state payloads
//!
//! The vocabulary is closed: every status an article/topic pairing can pass
//! through is listed here with its sequence rank. Ranks order the review
//! workflow; statuses sharing a rank are alternative outcomes of the same step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Cycle, DecisionId, MeetingId};
use crate::errors::{SharedError, SharedResult};

/// Status codes, serialized as their text ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    ReadyInitReview,
    RejectJournalTitle,
    RejectInitReview,
    PassedInitReview,
    Published,
    RejectBmReview,
    PassedBmReview,
    RejectFullReview,
    PassedFullReview,
    AgendaFutureChange,
    OnHold,
    FullReviewHold,
    OnAgenda,
    FinalBoardDecision,
    Fyi,
}

impl StatusCode {
    pub const ALL: [StatusCode; 15] = [
        StatusCode::ReadyInitReview,
        StatusCode::RejectJournalTitle,
        StatusCode::RejectInitReview,
        StatusCode::PassedInitReview,
        StatusCode::Published,
        StatusCode::RejectBmReview,
        StatusCode::PassedBmReview,
        StatusCode::RejectFullReview,
        StatusCode::PassedFullReview,
        StatusCode::AgendaFutureChange,
        StatusCode::OnHold,
        StatusCode::FullReviewHold,
        StatusCode::OnAgenda,
        StatusCode::FinalBoardDecision,
        StatusCode::Fyi,
    ];

    /// Sequence rank; `None` for statuses outside the review sequence
    pub fn rank(self) -> Option<u16> {
        match self {
            StatusCode::ReadyInitReview => Some(10),
            StatusCode::RejectJournalTitle => Some(20),
            StatusCode::RejectInitReview | StatusCode::PassedInitReview => Some(30),
            StatusCode::Published => Some(40),
            StatusCode::RejectBmReview | StatusCode::PassedBmReview => Some(50),
            StatusCode::RejectFullReview | StatusCode::PassedFullReview => Some(60),
            StatusCode::AgendaFutureChange | StatusCode::OnHold | StatusCode::FullReviewHold => Some(70),
            StatusCode::OnAgenda => Some(80),
            StatusCode::FinalBoardDecision => Some(90),
            StatusCode::Fyi => None,
        }
    }

    pub fn text_id(self) -> &'static str {
        match self {
            StatusCode::ReadyInitReview => "ready_init_review",
            StatusCode::RejectJournalTitle => "reject_journal_title",
            StatusCode::RejectInitReview => "reject_init_review",
            StatusCode::PassedInitReview => "passed_init_review",
            StatusCode::Published => "published",
            StatusCode::RejectBmReview => "reject_bm_review",
            StatusCode::PassedBmReview => "passed_bm_review",
            StatusCode::RejectFullReview => "reject_full_review",
            StatusCode::PassedFullReview => "passed_full_review",
            StatusCode::AgendaFutureChange => "agenda_future_change",
            StatusCode::OnHold => "on_hold",
            StatusCode::FullReviewHold => "full_review_hold",
            StatusCode::OnAgenda => "on_agenda",
            StatusCode::FinalBoardDecision => "final_board_decision",
            StatusCode::Fyi => "fyi",
        }
    }

    /// Sub-statuses a board manager can park an article in
    pub fn is_board_manager_action(self) -> bool {
        self.rank() == StatusCode::OnHold.rank()
    }

    /// Ranked and not yet on a meeting agenda
    pub fn awaiting_review(self) -> bool {
        match (self.rank(), StatusCode::OnAgenda.rank()) {
            (Some(rank), Some(agenda)) => rank < agenda,
            _ => false,
        }
    }

    /// Statuses that cannot be recorded without a payload
    pub fn requires_payload(self) -> bool {
        matches!(self, StatusCode::OnAgenda | StatusCode::FinalBoardDecision)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text_id())
    }
}

impl FromStr for StatusCode {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StatusCode::ALL
            .iter()
            .copied()
            .find(|code| code.text_id() == wanted)
            .ok_or(SharedError::UnknownStatus { code: s.to_string() })
    }
}

/// A status code that carries no payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StatusCode", into = "StatusCode")]
pub struct PlainStatus(StatusCode);

impl PlainStatus {
    pub const READY_INIT_REVIEW: PlainStatus = PlainStatus(StatusCode::ReadyInitReview);
    pub const REJECT_JOURNAL_TITLE: PlainStatus = PlainStatus(StatusCode::RejectJournalTitle);
    pub const PUBLISHED: PlainStatus = PlainStatus(StatusCode::Published);
    pub const PASSED_BM_REVIEW: PlainStatus = PlainStatus(StatusCode::PassedBmReview);
    pub const PASSED_FULL_REVIEW: PlainStatus = PlainStatus(StatusCode::PassedFullReview);

    pub fn new(code: StatusCode) -> SharedResult<Self> {
        if code.requires_payload() {
            return Err(SharedError::PayloadRequired { code: code.to_string() });
        }
        Ok(Self(code))
    }

    pub fn code(self) -> StatusCode {
        self.0
    }
}

impl TryFrom<StatusCode> for PlainStatus {
    type Error = SharedError;

    fn try_from(code: StatusCode) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<PlainStatus> for StatusCode {
    fn from(value: PlainStatus) -> Self {
        value.0
    }
}

/// Decision recorded with the final board decision status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDecision {
    pub decision: DecisionId,
    pub meeting_date: Cycle,
    pub discussed: bool,
}

/// What one state records: its status plus the payload that status demands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateValue {
    Plain { status: PlainStatus },
    OnAgenda { meeting: MeetingId },
    FinalBoardDecision { decision: BoardDecision },
}

impl StateValue {
    /// Payload-free state; fails for statuses that require a payload
    pub fn plain(code: StatusCode) -> SharedResult<Self> {
        Ok(StateValue::Plain { status: PlainStatus::new(code)? })
    }

    pub fn of(status: PlainStatus) -> Self {
        StateValue::Plain { status }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            StateValue::Plain { status } => status.code(),
            StateValue::OnAgenda { .. } => StatusCode::OnAgenda,
            StateValue::FinalBoardDecision { .. } => StatusCode::FinalBoardDecision,
        }
    }

    pub fn meeting(&self) -> Option<MeetingId> {
        match self {
            StateValue::OnAgenda { meeting } => Some(*meeting),
            _ => None,
        }
    }

    pub fn decision(&self) -> Option<&BoardDecision> {
        match self {
            StateValue::FinalBoardDecision { decision } => Some(decision),
            _ => None,
        }
    }
}
