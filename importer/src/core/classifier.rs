//! Disposition classifier
//!
//! Pure decision function: given one fetched record, what the repository
//! already holds for it, and the batch options, decide which dispositions to
//! report and which writes to make. Nothing here performs I/O; the orchestrator
//! gathers the inputs and applies the resulting `ArticleChange`.

use chrono::{DateTime, Utc};
use shared::{
    Article, ArticleId, ArticleMetadata, ArticleTopic, BoardId, Cycle, Disposition, NormalizedRecord, PlainStatus,
    SourceId, State, TagCode, TopicId, UserId,
};

use super::ledger::{auto_published_comment, NewState};
use super::options::{BatchOptions, Placement};
use crate::error::{ImportError, ImportResult};

/// Comment on the `published` state added for core-journal imports
pub const CORE_JOURNALS_COMMENT: &str = "Published because of import from core journals";

/// Comment on a journal-title rejection when the batch has none of its own
pub const NOT_LISTED_COMMENT: &str = "Journal is on the board's NOT list";

/// What the repository holds for the batch topic
#[derive(Debug, Clone, Copy)]
pub struct TopicSnapshot<'a> {
    pub article_topic: &'a ArticleTopic,
    pub current: Option<&'a State>,
}

/// Everything the classifier needs to know about one identifier
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub record: &'a NormalizedRecord,
    pub existing: Option<&'a Article>,
    /// Pairing of the article with the batch topic, if one exists
    pub topic: Option<TopicSnapshot<'a>>,
    /// The article is already in review for some other topic
    ///
    /// Counted as holding any topic pairing at all, so an existing article
    /// with no pairings is reported `imported` rather than `topic_added`.
    pub in_review_elsewhere: bool,
    /// The article's journal is on the board's exclusion list for the cycle
    pub excluded: bool,
}

/// How the article row itself changes
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleWrite {
    Create(ArticleMetadata),
    /// Existing article; `metadata` is present only when the source copy changed
    Refresh { id: ArticleId, metadata: Option<ArticleMetadata> },
}

/// Writes for the batch topic's article/topic pairing
#[derive(Debug, Clone, PartialEq)]
pub struct TopicChange {
    pub board: BoardId,
    pub topic: TopicId,
    pub cycle: Cycle,
    pub states: Vec<NewState>,
    pub tags: Vec<TagCode>,
    pub comment: Option<String>,
}

/// Full write set for one identifier, applied atomically by the repository
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleChange {
    pub source_id: SourceId,
    pub article: ArticleWrite,
    pub topic: Option<TopicChange>,
    pub full_text: Option<String>,
    pub internal_tags: Vec<String>,
    pub internal_comment: Option<String>,
    pub user: Option<UserId>,
    pub at: DateTime<Utc>,
}

impl ArticleChange {
    pub fn existing_article(&self) -> Option<ArticleId> {
        match self.article {
            ArticleWrite::Refresh { id, .. } => Some(id),
            ArticleWrite::Create(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Dispositions in audit order
    pub dispositions: Vec<Disposition>,
    pub change: ArticleChange,
    /// A new article/topic pairing entered review in this batch
    pub entered_review: bool,
}

/// Classify one successfully fetched record
pub fn classify(subject: &Subject<'_>, options: &BatchOptions, now: DateTime<Utc>) -> ImportResult<Classification> {
    let record = subject.record;
    let mut dispositions = Vec::new();

    let article = match subject.existing {
        Some(existing) => {
            let changed = existing.metadata != record.metadata;
            if changed {
                dispositions.push(Disposition::Replaced);
            }
            ArticleWrite::Refresh { id: existing.id, metadata: changed.then(|| record.metadata.clone()) }
        }
        None => ArticleWrite::Create(record.metadata.clone()),
    };

    let mut change = ArticleChange {
        source_id: record.source_id.clone(),
        article,
        topic: None,
        full_text: options.full_text.clone(),
        internal_tags: Vec::new(),
        internal_comment: None,
        user: options.user,
        at: now,
    };

    let Some(target) = options.target else {
        if let Some(internal) = &options.internal {
            change.internal_tags = internal.tags.clone();
            change.internal_comment = internal.comment.clone();
        }
        let outcome = if subject.existing.is_some() { Disposition::Duplicate } else { Disposition::Imported };
        dispositions.push(outcome);
        return Ok(Classification { dispositions, change, entered_review: false });
    };

    if let Some(snapshot) = subject.topic {
        if snapshot.current.is_none() {
            return Err(ImportError::classification(format!(
                "article topic {} for {} has no current state",
                snapshot.article_topic.id, record.source_id
            )));
        }
        dispositions.push(Disposition::Duplicate);
        return Ok(Classification { dispositions, change, entered_review: false });
    }

    let mut states = vec![NewState::plain(PlainStatus::READY_INIT_REVIEW).with_comment(options.comment.clone())];
    if subject.existing.is_some() && subject.in_review_elsewhere {
        dispositions.push(Disposition::TopicAdded);
    } else {
        dispositions.push(Disposition::Imported);
    }
    dispositions.push(Disposition::ReviewReady);

    if subject.excluded && !options.override_not_list {
        let comment = options.comment.clone().unwrap_or_else(|| NOT_LISTED_COMMENT.to_string());
        states.push(NewState::plain(PlainStatus::REJECT_JOURNAL_TITLE).with_comment(Some(comment)));
        dispositions.push(Disposition::NotListed);
    } else if options.core_journals_search && options.fast_track.is_none() {
        states.push(NewState::plain(PlainStatus::PUBLISHED).with_comment(Some(CORE_JOURNALS_COMMENT)));
    }

    if let Some(fast_track) = &options.fast_track {
        let comments = fast_track.comments.clone();
        match fast_track.placement {
            Placement::Published => {
                states.push(NewState::plain(PlainStatus::PUBLISHED).with_comment(comments));
            }
            placement => {
                let value = placement.state_value(target.cycle);
                let published = auto_published_comment(value.code());
                states.push(NewState::plain(PlainStatus::PUBLISHED).with_comment(Some(published)));
                states.push(NewState::new(value).with_comment(comments));
            }
        }
    }

    change.topic = Some(TopicChange {
        board: target.board,
        topic: target.topic,
        cycle: target.cycle,
        states,
        tags: options.tags(),
        comment: options.mgr_comment.clone(),
    });

    Ok(Classification { dispositions, change, entered_review: true })
}
