//! JSON-file article store
//!
//! One process-wide store backs the article repository, the state ledger and
//! the journal exclusion registry. A write stages copies of only the rows it
//! touches, merges them in, and persists the snapshot through a temp file and
//! rename. If persisting fails the merged rows are rolled back, so memory and
//! disk stay in step. Batch reports go to a separate append-only JSON-lines
//! file next to the snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{
    Article, ArticleId, ArticleTag, ArticleTopic, ArticleTopicId, Batch, BoardId, Comment, Cycle, FullText,
    InternalTag, JournalId, SourceId, State, StateId, TopicId, UserId, PUBMED_SOURCE,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

use crate::core::{ArticleChange, ArticleWrite, NewState, TopicChange, TopicLedger};
use crate::error::{ImportError, ImportResult};
use crate::traits::{ArticleRepository, JournalRegistry, StateLedger};

/// How long a caller waits for the store before reporting it busy
const LOCK_WAIT: Duration = Duration::from_secs(5);

/// Board's exclusion of one journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalExclusion {
    pub board: BoardId,
    pub start: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: JournalId,
    pub title: String,
    /// Boards that treat this journal as core
    #[serde(default)]
    pub core_boards: BTreeSet<BoardId>,
    #[serde(default)]
    pub not_lists: Vec<JournalExclusion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: BoardId,
    pub name: String,
    /// Board accepts automatic follow-up imports of corrections and retractions
    pub auto_imports: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Counters {
    next_article: u64,
    next_article_topic: u64,
    next_state: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(flatten)]
    counters: Counters,
    articles: BTreeMap<ArticleId, Article>,
    by_source: BTreeMap<SourceId, ArticleId>,
    topics: BTreeMap<ArticleTopicId, ArticleTopic>,
    states: BTreeMap<StateId, State>,
    journals: BTreeMap<JournalId, JournalRecord>,
    boards: BTreeMap<BoardId, BoardRecord>,
    /// Mirror of the batch log file
    #[serde(skip)]
    batches: Vec<Batch>,
}

/// Copies of the rows one write touches, built without changing the store
#[derive(Debug, Default)]
struct Staged {
    counters: Counters,
    articles: Vec<Article>,
    by_source: Option<(SourceId, ArticleId)>,
    topics: Vec<ArticleTopic>,
    states: BTreeMap<StateId, State>,
    journals: Vec<JournalRecord>,
    boards: Vec<BoardRecord>,
}

impl Staged {
    fn new(data: &StoreData) -> Self {
        Self { counters: data.counters, ..Self::default() }
    }
}

/// What a merge replaced; `None` marks a row the merge added
#[derive(Debug)]
struct Undo {
    counters: Counters,
    articles: Vec<(ArticleId, Option<Article>)>,
    by_source: Vec<(SourceId, Option<ArticleId>)>,
    topics: Vec<(ArticleTopicId, Option<ArticleTopic>)>,
    states: Vec<(StateId, Option<State>)>,
    journals: Vec<(JournalId, Option<JournalRecord>)>,
    boards: Vec<(BoardId, Option<BoardRecord>)>,
}

fn replace_rows<K: Ord + Clone, V>(map: &mut BTreeMap<K, V>, rows: impl IntoIterator<Item = (K, V)>) -> Vec<(K, Option<V>)> {
    rows.into_iter()
        .map(|(key, value)| {
            let previous = map.insert(key.clone(), value);
            (key, previous)
        })
        .collect()
}

fn restore_rows<K: Ord, V>(map: &mut BTreeMap<K, V>, undo: Vec<(K, Option<V>)>) {
    for (key, previous) in undo.into_iter().rev() {
        match previous {
            Some(value) => {
                map.insert(key, value);
            }
            None => {
                map.remove(&key);
            }
        }
    }
}

impl StoreData {
    fn article(&self, id: ArticleId) -> ImportResult<&Article> {
        self.articles
            .get(&id)
            .ok_or_else(|| ImportError::storage("commit", format!("article {id} does not exist")))
    }

    fn journal(&self, id: &JournalId) -> ImportResult<&JournalRecord> {
        self.journals
            .get(id)
            .ok_or_else(|| ImportError::storage("journal", format!("journal {id} is not registered")))
    }

    fn find_topic(&self, article: ArticleId, topic: TopicId) -> Option<&ArticleTopic> {
        let held = self.articles.get(&article)?;
        held.topics
            .iter()
            .filter_map(|id| self.topics.get(id))
            .find(|t| t.topic == topic)
    }

    /// Stage one identifier's write set
    fn stage_change(&self, change: ArticleChange, staged: &mut Staged) -> ImportResult<ArticleId> {
        let at = change.at;
        let user = change.user;

        let mut article = match change.article {
            ArticleWrite::Create(metadata) => {
                if self.by_source.contains_key(&change.source_id) {
                    return Err(ImportError::storage(
                        "commit",
                        format!("article {} was created concurrently", change.source_id),
                    ));
                }
                staged.counters.next_article += 1;
                let id = ArticleId::new(staged.counters.next_article);
                staged.by_source = Some((change.source_id.clone(), id));
                Article {
                    id,
                    source: PUBMED_SOURCE.to_string(),
                    source_id: change.source_id,
                    metadata,
                    imported: at,
                    imported_by: user,
                    updated: None,
                    data_checked: Some(at),
                    data_mod: None,
                    full_text: None,
                    internal_tags: Vec::new(),
                    internal_comments: Vec::new(),
                    topics: Vec::new(),
                }
            }
            ArticleWrite::Refresh { id, metadata } => {
                let mut article = self.article(id)?.clone();
                if let Some(metadata) = metadata {
                    article.metadata = metadata;
                    article.updated = Some(at);
                }
                article.data_checked = Some(at);
                article
            }
        };

        if let Some(file) = change.full_text {
            article.full_text = Some(FullText { file, user, attached: at });
        }
        for tag in change.internal_tags {
            if !article.internal_tags.iter().any(|held| held.tag == tag) {
                article.internal_tags.push(InternalTag { tag, added: at });
            }
        }
        if let Some(body) = change.internal_comment {
            article.internal_comments.push(Comment::new(body, user, at));
        }

        if let Some(topic) = change.topic {
            let pairing = self.stage_topic(&article, topic, user, at, staged)?;
            article.topics.push(pairing);
        }
        let id = article.id;
        staged.articles.push(article);
        Ok(id)
    }

    fn stage_topic(
        &self,
        article: &Article,
        change: TopicChange,
        user: Option<UserId>,
        at: chrono::DateTime<chrono::Utc>,
        staged: &mut Staged,
    ) -> ImportResult<ArticleTopicId> {
        if article.topics.iter().filter_map(|id| self.topics.get(id)).any(|t| t.topic == change.topic) {
            return Err(ImportError::classification(format!(
                "article {} already has topic {}",
                article.id, change.topic
            )));
        }

        staged.counters.next_article_topic += 1;
        let id = ArticleTopicId::new(staged.counters.next_article_topic);
        let mut pairing = ArticleTopic {
            id,
            article: article.id,
            topic: change.topic,
            board: change.board,
            cycle: change.cycle,
            states: Vec::new(),
            comments: change.comment.into_iter().map(|body| Comment::new(body, user, at)).collect(),
            tags: change
                .tags
                .into_iter()
                .map(|tag| ArticleTag { tag, assigned: at, user, active: true })
                .collect(),
        };

        let Staged { counters, states, .. } = &mut *staged;
        let mut allocate = || {
            counters.next_state += 1;
            StateId::new(counters.next_state)
        };
        let mut ledger = TopicLedger::new(&mut pairing, states);
        for entry in change.states {
            ledger.append(entry, user, at, &mut allocate)?;
        }

        staged.topics.push(pairing);
        Ok(id)
    }

    /// Swap staged rows in, returning what they replaced
    fn merge(&mut self, staged: Staged) -> Undo {
        let Staged { counters, articles, by_source, topics, states, journals, boards } = staged;
        Undo {
            counters: std::mem::replace(&mut self.counters, counters),
            articles: replace_rows(&mut self.articles, articles.into_iter().map(|a| (a.id, a))),
            by_source: replace_rows(&mut self.by_source, by_source),
            topics: replace_rows(&mut self.topics, topics.into_iter().map(|t| (t.id, t))),
            states: replace_rows(&mut self.states, states),
            journals: replace_rows(&mut self.journals, journals.into_iter().map(|j| (j.id.clone(), j))),
            boards: replace_rows(&mut self.boards, boards.into_iter().map(|b| (b.id, b))),
        }
    }

    fn rollback(&mut self, undo: Undo) {
        self.counters = undo.counters;
        restore_rows(&mut self.articles, undo.articles);
        restore_rows(&mut self.by_source, undo.by_source);
        restore_rows(&mut self.topics, undo.topics);
        restore_rows(&mut self.states, undo.states);
        restore_rows(&mut self.journals, undo.journals);
        restore_rows(&mut self.boards, undo.boards);
    }
}

/// Merged rows that are rolled back unless the write is confirmed
///
/// Dropping it mid-persist, e.g. on cancellation, also rolls back.
struct PendingWrite<'a> {
    data: &'a mut StoreData,
    undo: Option<Undo>,
}

impl PendingWrite<'_> {
    fn confirm(mut self) {
        self.undo = None;
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            self.data.rollback(undo);
        }
    }
}

fn batch_log_path(path: &Path) -> PathBuf {
    path.with_extension("batches.jsonl")
}

/// Read the batch log, skipping a final line torn by an interrupted append
async fn load_batches(path: &Path) -> ImportResult<Vec<Batch>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let mut batches: Vec<Batch> = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(batch) => batches.push(batch),
            Err(err) if index + 1 == lines.len() && !text.ends_with('\n') => {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring incomplete last batch record");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(batches)
}

/// Real implementation of ArticleRepository, StateLedger and JournalRegistry
pub struct RealArticleStore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl RealArticleStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> ImportResult<Self> {
        let path = path.into();
        let mut data: StoreData = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Starting a new article store");
                StoreData::default()
            }
            Err(err) => return Err(err.into()),
        };
        data.batches = load_batches(&batch_log_path(&path)).await?;
        Ok(Self { path: Some(path), data: Mutex::new(data) })
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self { path: None, data: Mutex::new(StoreData::default()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn lock(&self, operation: &str) -> ImportResult<MutexGuard<'_, StoreData>> {
        tokio::time::timeout(LOCK_WAIT, self.data.lock())
            .await
            .map_err(|_| ImportError::StoreBusy { operation: operation.to_string() })
    }

    async fn persist(&self, data: &StoreData) -> ImportResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(data)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }

    /// Stage the rows a mutation touches, merge them, and keep them once persisted
    async fn write<T>(
        &self,
        operation: &str,
        stage: impl FnOnce(&StoreData, &mut Staged) -> ImportResult<T>,
    ) -> ImportResult<T> {
        let mut guard = self.lock(operation).await?;
        let mut staged = Staged::new(&guard);
        let result = stage(&*guard, &mut staged)?;
        let undo = guard.merge(staged);
        let pending = PendingWrite { data: &mut *guard, undo: Some(undo) };
        self.persist(&*pending.data).await?;
        pending.confirm();
        Ok(result)
    }

    pub async fn add_board(&self, id: BoardId, name: impl Into<String>, auto_imports: bool) -> ImportResult<()> {
        let record = BoardRecord { id, name: name.into(), auto_imports };
        self.write("add board", |_, staged| {
            staged.boards.push(record);
            Ok(())
        })
        .await
    }

    pub async fn add_journal(&self, id: JournalId, title: impl Into<String>) -> ImportResult<()> {
        let title = title.into();
        self.write("add journal", |data, staged| {
            if !data.journals.contains_key(&id) {
                staged.journals.push(JournalRecord { id, title, core_boards: BTreeSet::new(), not_lists: Vec::new() });
            }
            Ok(())
        })
        .await
    }

    pub async fn set_core(&self, journal: &JournalId, board: BoardId) -> ImportResult<()> {
        self.write("set core journal", |data, staged| {
            let mut record = data.journal(journal)?.clone();
            record.core_boards.insert(board);
            staged.journals.push(record);
            Ok(())
        })
        .await
    }

    pub async fn exclude_journal(
        &self,
        journal: &JournalId,
        board: BoardId,
        start: NaiveDate,
        user: Option<UserId>,
    ) -> ImportResult<()> {
        self.write("exclude journal", |data, staged| {
            let mut record = data.journal(journal)?.clone();
            record.not_lists.push(JournalExclusion { board, start, user });
            staged.journals.push(record);
            Ok(())
        })
        .await
    }

    pub async fn article(&self, source_id: &SourceId) -> ImportResult<Option<Article>> {
        let data = self.lock("article").await?;
        Ok(data.by_source.get(source_id).and_then(|id| data.articles.get(id)).cloned())
    }

    pub async fn batches(&self) -> ImportResult<Vec<Batch>> {
        Ok(self.lock("batches").await?.batches.clone())
    }
}

#[async_trait::async_trait]
impl ArticleRepository for RealArticleStore {
    async fn find_by_source_id(&self, source_id: &SourceId) -> ImportResult<Option<Article>> {
        self.article(source_id).await
    }

    async fn topics_for(&self, article: ArticleId) -> ImportResult<Vec<ArticleTopic>> {
        let data = self.lock("topics").await?;
        let Some(held) = data.articles.get(&article) else {
            return Ok(Vec::new());
        };
        Ok(held.topics.iter().filter_map(|id| data.topics.get(id)).cloned().collect())
    }

    async fn commit(&self, change: ArticleChange) -> ImportResult<ArticleId> {
        let source_id = change.source_id.clone();
        let id = self.write("commit", |data, staged| data.stage_change(change, staged)).await?;
        tracing::debug!(%source_id, article = %id, "Committed article change");
        Ok(id)
    }

    async fn record_batch(&self, batch: &Batch) -> ImportResult<()> {
        let mut guard = self.lock("record batch").await?;
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut line = serde_json::to_vec(batch)?;
            line.push(b'\n');
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(batch_log_path(path))
                .await?;
            file.write_all(&line).await?;
            file.flush().await?;
        }
        guard.batches.push(batch.clone());
        Ok(())
    }

    async fn source_ids(&self) -> ImportResult<Vec<SourceId>> {
        Ok(self.lock("source ids").await?.by_source.keys().cloned().collect())
    }

    async fn latest_modification(&self) -> ImportResult<Option<NaiveDate>> {
        let data = self.lock("latest modification").await?;
        Ok(data.articles.values().filter_map(|a| a.data_mod).max())
    }

    async fn mark_modified(&self, ids: &[SourceId], day: NaiveDate) -> ImportResult<usize> {
        self.write("mark modified", |data, staged| {
            for source_id in ids {
                let Some(article) = data.by_source.get(source_id).and_then(|id| data.articles.get(id)) else {
                    continue;
                };
                let stale = article.data_mod.map_or(true, |held| held < day);
                if stale && !staged.articles.iter().any(|held| held.id == article.id) {
                    let mut article = article.clone();
                    article.data_mod = Some(day);
                    staged.articles.push(article);
                }
            }
            Ok(staged.articles.len())
        })
        .await
    }

    async fn stale_source_ids(&self) -> ImportResult<Vec<SourceId>> {
        let data = self.lock("stale source ids").await?;
        Ok(data
            .articles
            .values()
            .filter(|a| a.needs_refresh())
            .map(|a| a.source_id.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl StateLedger for RealArticleStore {
    async fn add_state(
        &self,
        article_topic: ArticleTopicId,
        entry: NewState,
        user: Option<UserId>,
    ) -> ImportResult<State> {
        let at = chrono::Utc::now();
        self.write("add state", |data, staged| {
            let mut pairing = data
                .topics
                .get(&article_topic)
                .cloned()
                .ok_or_else(|| ImportError::storage("add state", format!("article topic {article_topic} does not exist")))?;
            let Staged { counters, states, topics, .. } = staged;
            states.extend(pairing.states.iter().filter_map(|id| data.states.get(id)).map(|s| (s.id, s.clone())));
            let mut allocate = || {
                counters.next_state += 1;
                StateId::new(counters.next_state)
            };
            let id = TopicLedger::new(&mut pairing, states).append(entry, user, at, &mut allocate)?;
            topics.push(pairing);
            states
                .get(&id)
                .cloned()
                .ok_or_else(|| ImportError::storage("add state", format!("state {id} was not stored")))
        })
        .await
    }

    async fn current_state(&self, article: ArticleId, topic: TopicId) -> ImportResult<Option<State>> {
        let data = self.lock("current state").await?;
        let Some(pairing) = data.find_topic(article, topic) else {
            return Ok(None);
        };
        Ok(pairing
            .states
            .iter()
            .rev()
            .filter_map(|id| data.states.get(id))
            .find(|s| s.current)
            .cloned())
    }

    async fn topic(&self, article: ArticleId, topic: TopicId) -> ImportResult<Option<ArticleTopic>> {
        Ok(self.lock("topic").await?.find_topic(article, topic).cloned())
    }

    async fn history(&self, article_topic: ArticleTopicId) -> ImportResult<Vec<State>> {
        let data = self.lock("history").await?;
        let Some(pairing) = data.topics.get(&article_topic) else {
            return Ok(Vec::new());
        };
        Ok(pairing.states.iter().filter_map(|id| data.states.get(id)).cloned().collect())
    }
}

#[async_trait::async_trait]
impl JournalRegistry for RealArticleStore {
    async fn is_excluded(&self, journal: &JournalId, board: BoardId, cycle: Cycle) -> ImportResult<bool> {
        let data = self.lock("exclusion").await?;
        Ok(data.journals.get(journal).map_or(false, |record| {
            record
                .not_lists
                .iter()
                .any(|entry| entry.board == board && entry.start <= cycle.first_day())
        }))
    }

    async fn is_core(&self, journal: &JournalId, board: BoardId) -> ImportResult<bool> {
        let data = self.lock("core journal").await?;
        let core = data.journals.get(journal).map_or(false, |record| record.core_boards.contains(&board));
        let auto_imports = data.boards.get(&board).map_or(false, |record| record.auto_imports);
        Ok(core && auto_imports)
    }
}
