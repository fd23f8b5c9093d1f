//! Append-only state history for one article/topic pairing
//!
//! `TopicLedger` is the only code that creates `State` rows. It keeps exactly
//! one state current per topic, refuses transitions that would move the
//! current rank backwards, and back-fills a `published` state when an article
//! is placed beyond it without ever having been published.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shared::{ArticleTopic, Comment, PlainStatus, State, StateId, StateValue, StatusCode, UserId};

use crate::error::{ImportError, ImportResult};

/// A state waiting to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewState {
    pub value: StateValue,
    pub comments: Vec<String>,
}

impl NewState {
    pub fn new(value: StateValue) -> Self {
        Self { value, comments: Vec::new() }
    }

    pub fn plain(status: PlainStatus) -> Self {
        Self::new(StateValue::of(status))
    }

    pub fn with_comment(mut self, comment: Option<impl Into<String>>) -> Self {
        if let Some(comment) = comment {
            self.comments.push(comment.into());
        }
        self
    }

    pub fn code(&self) -> StatusCode {
        self.value.code()
    }
}

/// Comment carried by a back-filled `published` state
pub fn auto_published_comment(placed: StatusCode) -> String {
    format!("Published state added as a result of setting the state for this article/topic to {placed}")
}

/// Mutable view over one topic and the state rows it references
pub struct TopicLedger<'a> {
    topic: &'a mut ArticleTopic,
    states: &'a mut BTreeMap<StateId, State>,
}

impl<'a> TopicLedger<'a> {
    pub fn new(topic: &'a mut ArticleTopic, states: &'a mut BTreeMap<StateId, State>) -> Self {
        Self { topic, states }
    }

    /// States in insertion order
    pub fn history(&self) -> Vec<&State> {
        self.topic.states.iter().filter_map(|id| self.states.get(id)).collect()
    }

    pub fn current(&self) -> Option<&State> {
        self.history().into_iter().rev().find(|s| s.current)
    }

    /// Append a state, making it the only current one
    ///
    /// # Parameters
    /// - `entry`: status, payload and comments of the new state
    /// - `user`: who the change is attributed to
    /// - `now`: timestamp for the state and its comments
    /// - `next_id`: allocator for new state ids
    ///
    /// # Returns
    /// Id of the appended state
    pub fn append(
        &mut self,
        entry: NewState,
        user: Option<UserId>,
        now: DateTime<Utc>,
        next_id: &mut dyn FnMut() -> StateId,
    ) -> ImportResult<StateId> {
        let current_rank = self.check_consistency()?;
        let code = entry.code();

        if let (Some(current), Some(attempted)) = (current_rank, code.rank()) {
            if attempted < current.1 {
                return Err(ImportError::RegressiveTransition { current: current.0, attempted: code });
            }
        }

        if self.needs_published_before(code, current_rank.map(|c| c.1)) {
            let published = NewState::plain(PlainStatus::PUBLISHED).with_comment(Some(auto_published_comment(code)));
            self.push(published, user, now, next_id());
        }

        let id = next_id();
        self.push(entry, user, now, id);
        Ok(id)
    }

    /// Current (code, rank) if the history is well formed
    fn check_consistency(&self) -> ImportResult<Option<(StatusCode, u16)>> {
        let history = self.history();
        if history.len() != self.topic.states.len() {
            return Err(ImportError::classification(format!(
                "article topic {} references missing states",
                self.topic.id
            )));
        }
        let current: Vec<_> = history.iter().filter(|s| s.current).collect();
        match current.as_slice() {
            [] if history.is_empty() => Ok(None),
            [] => Err(ImportError::classification(format!(
                "article topic {} has states but none is current",
                self.topic.id
            ))),
            [only] => Ok(self.ranked_position(only.value.code())),
            _ => Err(ImportError::classification(format!(
                "article topic {} has {} current states",
                self.topic.id,
                current.len()
            ))),
        }
    }

    /// Where the review stands: the current state's rank, or the highest rank
    /// reached when the current state is unranked
    fn ranked_position(&self, current: StatusCode) -> Option<(StatusCode, u16)> {
        match current.rank() {
            Some(rank) => Some((current, rank)),
            None => self
                .history()
                .iter()
                .filter_map(|s| s.value.code().rank().map(|r| (s.value.code(), r)))
                .max_by_key(|(_, rank)| *rank),
        }
    }

    fn needs_published_before(&self, code: StatusCode, current_rank: Option<u16>) -> bool {
        let (Some(rank), Some(published)) = (code.rank(), StatusCode::Published.rank()) else {
            return false;
        };
        let already_published = self.history().iter().any(|s| s.value.code() == StatusCode::Published);
        rank > published && !already_published && current_rank.map_or(true, |c| c <= published)
    }

    fn push(&mut self, entry: NewState, user: Option<UserId>, now: DateTime<Utc>, id: StateId) {
        let previous: Vec<StateId> = self.topic.states.clone();
        for state_id in previous {
            if let Some(state) = self.states.get_mut(&state_id) {
                state.current = false;
            }
        }
        let comments = entry.comments.into_iter().map(|body| Comment::new(body, user, now)).collect();
        let state = State {
            id,
            article: self.topic.article,
            article_topic: self.topic.id,
            value: entry.value,
            board: self.topic.board,
            topic: self.topic.topic,
            user,
            entered: now,
            active: true,
            current: true,
            comments,
        };
        self.states.insert(id, state);
        self.topic.states.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ArticleId, ArticleTopicId, BoardId, MeetingId, TopicId};

    struct Fixture {
        topic: ArticleTopic,
        states: BTreeMap<StateId, State>,
        next: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let topic = ArticleTopic {
                id: ArticleTopicId::new(1),
                article: ArticleId::new(7),
                topic: TopicId::new(3),
                board: BoardId::new(2),
                cycle: "2020-06-01".parse().unwrap(),
                states: Vec::new(),
                comments: Vec::new(),
                tags: Vec::new(),
            };
            Self { topic, states: BTreeMap::new(), next: 0 }
        }

        fn append(&mut self, entry: NewState) -> ImportResult<StateId> {
            let mut next = self.next;
            let mut alloc = || {
                next += 1;
                StateId::new(next)
            };
            let result = TopicLedger::new(&mut self.topic, &mut self.states).append(entry, None, Utc::now(), &mut alloc);
            self.next = next;
            result
        }

        fn codes(&self) -> Vec<StatusCode> {
            self.topic.states.iter().map(|id| self.states[id].value.code()).collect()
        }

        fn current_flags(&self) -> Vec<bool> {
            self.topic.states.iter().map(|id| self.states[id].current).collect()
        }
    }

    #[test]
    fn test_first_state_is_current() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        assert_eq!(fixture.current_flags(), vec![true]);
        let state = fixture.states.values().next().unwrap();
        assert!(state.active);
        assert_eq!(state.board, BoardId::new(2));
        assert_eq!(state.topic, TopicId::new(3));
    }

    #[test]
    fn test_exactly_one_current_after_appends() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        fixture.append(NewState::plain(PlainStatus::PUBLISHED)).unwrap();
        fixture.append(NewState::new(StateValue::OnAgenda { meeting: MeetingId::new(12) })).unwrap();

        assert_eq!(
            fixture.codes(),
            vec![StatusCode::ReadyInitReview, StatusCode::Published, StatusCode::OnAgenda]
        );
        assert_eq!(fixture.current_flags(), vec![false, false, true]);

        let ledger = TopicLedger::new(&mut fixture.topic, &mut fixture.states);
        assert_eq!(ledger.current().unwrap().value.meeting(), Some(MeetingId::new(12)));
    }

    #[test]
    fn test_regressive_transition_refused() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        fixture.append(NewState::plain(PlainStatus::PUBLISHED)).unwrap();
        let err = fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap_err();
        assert!(matches!(err, ImportError::RegressiveTransition { .. }));
        assert_eq!(fixture.codes().len(), 2);
        assert_eq!(fixture.current_flags(), vec![false, true]);
    }

    #[test]
    fn test_equal_rank_allowed() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        fixture.append(NewState::plain(PlainStatus::PUBLISHED)).unwrap();
        fixture.append(NewState::plain(PlainStatus::new(StatusCode::RejectBmReview).unwrap())).unwrap();
        fixture.append(NewState::plain(PlainStatus::PASSED_BM_REVIEW)).unwrap();
        assert_eq!(fixture.codes().last(), Some(&StatusCode::PassedBmReview));
    }

    #[test]
    fn test_published_back_filled() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        fixture.append(NewState::plain(PlainStatus::PASSED_FULL_REVIEW)).unwrap();

        assert_eq!(
            fixture.codes(),
            vec![StatusCode::ReadyInitReview, StatusCode::Published, StatusCode::PassedFullReview]
        );
        let published = &fixture.states[&fixture.topic.states[1]];
        assert_eq!(published.comments.len(), 1);
        assert_eq!(published.comments[0].body, auto_published_comment(StatusCode::PassedFullReview));
        assert_eq!(fixture.current_flags(), vec![false, false, true]);
    }

    #[test]
    fn test_no_back_fill_for_rejection() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        fixture.append(NewState::plain(PlainStatus::REJECT_JOURNAL_TITLE)).unwrap();
        assert_eq!(fixture.codes(), vec![StatusCode::ReadyInitReview, StatusCode::RejectJournalTitle]);
    }

    #[test]
    fn test_fyi_keeps_rank_position() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        fixture.append(NewState::plain(PlainStatus::PUBLISHED)).unwrap();
        fixture.append(NewState::plain(PlainStatus::new(StatusCode::Fyi).unwrap())).unwrap();
        // The article was published before the FYI note, so it cannot drop back
        let err = fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap_err();
        assert!(matches!(err, ImportError::RegressiveTransition { current: StatusCode::Published, .. }));
    }

    #[test]
    fn test_broken_history_reported() {
        let mut fixture = Fixture::new();
        fixture.append(NewState::plain(PlainStatus::READY_INIT_REVIEW)).unwrap();
        for state in fixture.states.values_mut() {
            state.current = false;
        }
        let err = fixture.append(NewState::plain(PlainStatus::PUBLISHED)).unwrap_err();
        assert!(matches!(err, ImportError::ClassificationError { .. }));
    }
}
