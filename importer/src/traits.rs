//! Trait definitions with mockall annotations for testing
//!
//! The batch orchestrator reaches every collaborator through these traits:
//! the bibliographic source, the article repository, the state ledger and the
//! journal exclusion registry. Real implementations live in `services`.

use chrono::NaiveDate;
use shared::{
    Article, ArticleId, ArticleTopic, ArticleTopicId, Batch, BoardId, Cycle, FetchOutcome, JournalId, SourceId,
    State, TopicId, UserId,
};

use crate::core::{ArticleChange, NewState};
use crate::error::ImportResult;

/// Bibliographic source connector
///
/// Fetches and parses records from the upstream literature database.
#[mockall::automock]
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch normalized records for a group of identifiers
    ///
    /// # Parameters
    /// - `ids`: Identifiers to fetch, at most one chunk's worth
    ///
    /// # Returns
    /// One outcome per record the source answered with. Identifiers may be
    /// missing from the result; an `Err` means the whole request failed.
    async fn fetch(&self, ids: &[SourceId]) -> ImportResult<Vec<FetchOutcome>>;

    /// Look up the journal a record was published in
    async fn journal_of(&self, id: &SourceId) -> ImportResult<Option<JournalId>>;

    /// Identifiers whose upstream record was modified on the given day
    async fn modified_on(&self, day: NaiveDate) -> ImportResult<Vec<SourceId>>;
}

/// Durable store of articles and their topic associations
#[mockall::automock]
#[async_trait::async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Resolve an article by its source identifier
    async fn find_by_source_id(&self, source_id: &SourceId) -> ImportResult<Option<Article>>;

    /// All topic associations of an article
    async fn topics_for(&self, article: ArticleId) -> ImportResult<Vec<ArticleTopic>>;

    /// Apply one identifier's write set atomically
    ///
    /// # Parameters
    /// - `change`: Article create/refresh, topic states, tags and annotations
    ///
    /// # Returns
    /// Id of the created or updated article
    async fn commit(&self, change: ArticleChange) -> ImportResult<ArticleId>;

    /// Keep the report of a processed batch
    async fn record_batch(&self, batch: &Batch) -> ImportResult<()>;

    /// Every held source identifier
    async fn source_ids(&self) -> ImportResult<Vec<SourceId>>;

    /// Latest upstream modification day recorded on any article
    async fn latest_modification(&self) -> ImportResult<Option<NaiveDate>>;

    /// Stamp the upstream modification day on held articles
    ///
    /// # Returns
    /// Number of articles whose stamp changed
    async fn mark_modified(&self, ids: &[SourceId], day: NaiveDate) -> ImportResult<usize>;

    /// Identifiers of articles modified upstream since they were last checked
    async fn stale_source_ids(&self) -> ImportResult<Vec<SourceId>>;
}

/// Append-only per-topic state history
#[mockall::automock]
#[async_trait::async_trait]
pub trait StateLedger: Send + Sync {
    /// Append a state to an article/topic pairing, making it current
    ///
    /// # Parameters
    /// - `article_topic`: Pairing to extend
    /// - `entry`: Status, payload and comments for the new state
    /// - `user`: Who the change is attributed to
    ///
    /// # Returns
    /// The stored state
    async fn add_state(&self, article_topic: ArticleTopicId, entry: NewState, user: Option<UserId>)
        -> ImportResult<State>;

    /// Current state of an article for a topic
    async fn current_state(&self, article: ArticleId, topic: TopicId) -> ImportResult<Option<State>>;

    /// Association of an article with a topic
    async fn topic(&self, article: ArticleId, topic: TopicId) -> ImportResult<Option<ArticleTopic>>;

    /// States of a pairing in insertion order
    async fn history(&self, article_topic: ArticleTopicId) -> ImportResult<Vec<State>>;
}

/// Per-board journal exclusion list and core journal flags
#[mockall::automock]
#[async_trait::async_trait]
pub trait JournalRegistry: Send + Sync {
    /// Whether the journal is excluded for the board as of the cycle
    async fn is_excluded(&self, journal: &JournalId, board: BoardId, cycle: Cycle) -> ImportResult<bool>;

    /// Whether the journal is core for the board and the board takes follow-up imports
    async fn is_core(&self, journal: &JournalId, board: BoardId) -> ImportResult<bool>;
}
