//! Articles, their topic associations, and topic state histories

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ArticleId, ArticleTopicId, BoardId, Cycle, JournalId, SourceId, StateId, StateValue, TopicId, UserId};

/// Bibliographic source name stored with every article
pub const PUBMED_SOURCE: &str = "Pubmed";

/// One author as delivered by the source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collective_name: Option<String>,
}

impl Author {
    /// "Last Initials" for people, the collective name for groups
    pub fn display_name(&self) -> String {
        match (&self.last_name, &self.collective_name) {
            (Some(last), _) => match &self.initials {
                Some(initials) => format!("{last} {initials}"),
                None => last.clone(),
            },
            (None, Some(collective)) => collective.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Publication date parts, kept as the source spells them
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PubDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medline_date: Option<String>,
}

impl PubDate {
    pub fn is_empty(&self) -> bool {
        self == &PubDate::default()
    }
}

/// One labelled abstract paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractParagraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub text: String,
}

/// Normalized bibliographic fields; equality decides whether a refresh replaces stored data
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_id: Option<JournalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_journal_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    #[serde(default, skip_serializing_if = "PubDate::is_empty")]
    pub pub_date: PubDate,
    #[serde(default)]
    pub publication_types: Vec<String>,
    #[serde(default)]
    pub abstract_paragraphs: Vec<AbstractParagraph>,
}

impl ArticleMetadata {
    pub fn year(&self) -> Option<i32> {
        self.pub_date.year.as_deref().and_then(|y| y.trim().parse().ok())
    }
}

/// A dated remark attached to an article, topic or state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub body: String,
    pub entered: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
}

impl Comment {
    pub fn new(body: impl Into<String>, user: Option<UserId>, entered: DateTime<Utc>) -> Self {
        Self { body: body.into(), entered, user }
    }
}

/// Reference to a stored full-text document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullText {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    pub attached: DateTime<Utc>,
}

/// Free-form tag set on an article by an internal import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTag {
    pub tag: String,
    pub added: DateTime<Utc>,
}

/// One bibliographic item per (source, source identifier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub source: String,
    pub source_id: SourceId,
    pub metadata: ArticleMetadata,
    pub imported: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_mod: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<FullText>,
    #[serde(default)]
    pub internal_tags: Vec<InternalTag>,
    #[serde(default)]
    pub internal_comments: Vec<Comment>,
    #[serde(default)]
    pub topics: Vec<ArticleTopicId>,
}

impl Article {
    /// Whether upstream reported a change this article has not yet picked up
    pub fn needs_refresh(&self) -> bool {
        match (self.data_mod, self.data_checked) {
            (Some(modified), Some(checked)) => checked.date_naive() < modified,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Tags the importer attaches to an article/topic pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagCode {
    #[serde(rename = "i_specialsearch")]
    SpecialSearch,
    #[serde(rename = "i_core_journals")]
    CoreJournals,
    #[serde(rename = "high_priority")]
    HighPriority,
    #[serde(rename = "i_fasttrack")]
    FastTrack,
}

impl TagCode {
    pub fn text_id(self) -> &'static str {
        match self {
            TagCode::SpecialSearch => "i_specialsearch",
            TagCode::CoreJournals => "i_core_journals",
            TagCode::HighPriority => "high_priority",
            TagCode::FastTrack => "i_fasttrack",
        }
    }
}

impl fmt::Display for TagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTag {
    pub tag: TagCode,
    pub assigned: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    pub active: bool,
}

/// Association of one article with one review topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleTopic {
    pub id: ArticleTopicId,
    pub article: ArticleId,
    pub topic: TopicId,
    pub board: BoardId,
    pub cycle: Cycle,
    /// State history in insertion order
    #[serde(default)]
    pub states: Vec<StateId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub tags: Vec<ArticleTag>,
}

impl ArticleTopic {
    pub fn has_tag(&self, tag: TagCode) -> bool {
        self.tags.iter().any(|t| t.active && t.tag == tag)
    }
}

/// One immutable snapshot in an article/topic review history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub article: ArticleId,
    pub article_topic: ArticleTopicId,
    pub value: StateValue,
    pub board: BoardId,
    pub topic: TopicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    pub entered: DateTime<Utc>,
    pub active: bool,
    pub current: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
}
