//! Batch orchestrator
//!
//! Drives one import request end to end: validates the options, fetches the
//! records in chunks, classifies every identifier in request order, commits
//! each identifier's writes atomically, and assembles the Batch report. All
//! collaborators are injected through the traits in `crate::traits`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use shared::{
    job_debug, job_error, job_info, job_warn, ArticleId, Batch, BatchId, FetchOutcome, ImportRequest, JobKind,
    JournalId, NormalizedRecord, SourceId,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::{classify, reconcile, BatchLog, BatchOptions, Classification, FollowupCollector, Subject, TopicSnapshot};
use crate::error::{ImportError, ImportResult};
use crate::services::retry_with_backoff;
use crate::traits::{ArticleRepository, JournalRegistry, RecordSource, StateLedger};

/// How records are pulled from the source and how long writes are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Identifiers per source request
    pub chunk_size: usize,
    /// Minimum gap between the starts of consecutive chunk requests
    pub chunk_pause: Duration,
    /// Chunks in flight at once; results are still consumed in request order
    pub concurrency: usize,
    /// Retry budget for transient store failures
    pub retry_max_wait: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            chunk_pause: Duration::from_millis(500),
            concurrency: 1,
            retry_max_wait: Duration::from_secs(30),
        }
    }
}

/// Spaces request starts across concurrently polled futures
///
/// The lock is fair, so turns are granted in the order futures first ask.
struct Pacer {
    pause: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(pause: Duration) -> Self {
        Self { pause, last_start: Mutex::new(None) }
    }

    async fn wait_turn(&self) {
        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            if !self.pause.is_zero() {
                tokio::time::sleep_until(previous + self.pause).await;
            }
        }
        *last_start = Some(Instant::now());
    }
}

/// Orchestrates import batches over injected services
pub struct BatchOrchestrator<S, R, L, J>
where
    S: RecordSource + 'static,
    R: ArticleRepository + 'static,
    L: StateLedger + 'static,
    J: JournalRegistry + 'static,
{
    pub(crate) source: Arc<S>,
    pub(crate) repository: Arc<R>,
    pub(crate) ledger: Arc<L>,
    pub(crate) registry: Arc<J>,
    pub(crate) settings: FetchSettings,
}

impl<S, R, L, J> BatchOrchestrator<S, R, L, J>
where
    S: RecordSource + 'static,
    R: ArticleRepository + 'static,
    L: StateLedger + 'static,
    J: JournalRegistry + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(source: Arc<S>, repository: Arc<R>, ledger: Arc<L>, registry: Arc<J>) -> Self {
        Self { source, repository, ledger, registry, settings: FetchSettings::default() }
    }

    pub fn with_fetch_settings(mut self, settings: FetchSettings) -> Self {
        self.settings = FetchSettings {
            chunk_size: settings.chunk_size.max(1),
            concurrency: settings.concurrency.max(1),
            ..settings
        };
        self
    }

    pub fn settings(&self) -> FetchSettings {
        self.settings
    }

    /// Process one import request to completion
    ///
    /// # Returns
    /// The Batch report. `Err` only for requests that fail validation; every
    /// per-identifier failure is reported as an `error` action instead.
    pub async fn process(&self, request: ImportRequest) -> ImportResult<Batch> {
        self.process_with_cancel(request, &CancellationToken::new()).await
    }

    /// Process one import request, stopping before the next identifier once
    /// `cancel` fires
    pub async fn process_with_cancel(&self, request: ImportRequest, cancel: &CancellationToken) -> ImportResult<Batch> {
        let job = JobKind::current();
        let options = BatchOptions::from_request(&request)?;
        let started = Utc::now();
        let total = options.article_ids.len();

        job_info!(
            job,
            "📥 Processing {} batch of {} identifiers{}",
            options.import_type,
            total,
            if options.test_mode { " (test mode)" } else { "" }
        );

        let fetched = self.fetch_all(&options.article_ids, cancel).await;
        let mut reconciled = reconcile(&options.article_ids, fetched);

        let mut log = BatchLog::new();
        let mut followups = FollowupCollector::new(&options.article_ids);
        let mut processed = 0;
        let mut cancelled = false;

        for source_id in &options.article_ids {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let outcome = reconciled.take(source_id);
            self.process_one(outcome, &options, started, &mut log, &mut followups).await;
            processed += 1;
        }

        if cancelled {
            job_warn!(job, "🛑 Batch cancelled after {} of {} identifiers", processed, total);
            log.note(format!("Batch cancelled after {processed} of {total} identifiers"));
        } else {
            for surplus in reconciled.surplus {
                if let FetchOutcome::Failed(failure) = surplus {
                    job_warn!(job, "⚠️ {}: {}", failure.source_id, failure.reason);
                    log.error(&failure.source_id, None, failure.reason);
                }
            }
        }

        let mut batch = log.finish(BatchId::new(), &options, followups.into_ids(), started);

        if !options.test_mode {
            if let Err(err) = self.repository.record_batch(&batch).await {
                job_error!(job, "❌ Unable to record batch {}: {}", batch.id, err);
                batch.messages.push(format!("Batch report was not saved: {err}"));
            }
        }

        job_info!(
            job,
            "✅ Batch {} finished: {} actions, {} errors, {} follow-ups, success={}",
            batch.id,
            batch.actions.len(),
            batch.error_count(),
            batch.followup_ids.len(),
            batch.success
        );
        Ok(batch)
    }

    /// Fetch every identifier, chunk by chunk
    ///
    /// Chunk requests start at least `chunk_pause` apart, however many are in
    /// flight. A chunk whose request fails outright turns into one failure per
    /// identifier in it. Stops early when `cancel` fires.
    pub(crate) async fn fetch_all(&self, ids: &[SourceId], cancel: &CancellationToken) -> Vec<FetchOutcome> {
        let job = JobKind::current();
        let source = &self.source;
        let chunk_count = ids.len().div_ceil(self.settings.chunk_size);
        let pacer = &Pacer::new(self.settings.chunk_pause);

        let chunks = stream::iter(ids.chunks(self.settings.chunk_size).enumerate())
            .map(|(index, chunk)| async move {
                pacer.wait_turn().await;
                (index, chunk, source.fetch(chunk).await)
            })
            .buffered(self.settings.concurrency);
        futures_util::pin_mut!(chunks);

        let mut outcomes = Vec::with_capacity(ids.len());
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = chunks.next() => next,
            };
            let Some((index, chunk, result)) = next else {
                break;
            };
            match result {
                Ok(fetched) => {
                    job_debug!(job, "📦 Chunk {}/{}: {} records", index + 1, chunk_count, fetched.len());
                    outcomes.extend(fetched);
                }
                Err(err) => {
                    job_warn!(job, "⚠️ Chunk {}/{} failed: {}", index + 1, chunk_count, err);
                    let reason = err.to_string();
                    outcomes.extend(chunk.iter().map(|id| FetchOutcome::failed(id.clone(), reason.clone())));
                }
            }
        }
        outcomes
    }

    /// Classify and apply one identifier, logging its actions
    async fn process_one(
        &self,
        outcome: FetchOutcome,
        options: &BatchOptions,
        now: DateTime<Utc>,
        log: &mut BatchLog,
        followups: &mut FollowupCollector,
    ) {
        let job = JobKind::current();
        let record = match outcome {
            FetchOutcome::Found(record) => record,
            FetchOutcome::Failed(failure) => {
                job_warn!(job, "⚠️ {}: {}", failure.source_id, failure.reason);
                log.error(&failure.source_id, None, failure.reason);
                return;
            }
        };

        match self.classify_and_apply(&record, options, now).await {
            Ok((article_id, classification)) => {
                job_debug!(job, "📝 {}: {:?}", record.source_id, classification.dispositions);
                log.record(&record.source_id, article_id, &classification.dispositions);
                if classification.entered_review {
                    self.collect_followups(&record, article_id, options, log, followups).await;
                }
            }
            Err(err) => {
                job_error!(job, "❌ {}: {}", record.source_id, err);
                log.error(&record.source_id, None, err.to_string());
            }
        }
    }

    /// Gather what the store holds for a record, classify it, and commit the
    /// resulting change unless the batch is a dry run
    async fn classify_and_apply(
        &self,
        record: &NormalizedRecord,
        options: &BatchOptions,
        now: DateTime<Utc>,
    ) -> ImportResult<(Option<ArticleId>, Classification)> {
        let existing = self.repository.find_by_source_id(&record.source_id).await?;

        let mut pairing = None;
        let mut current = None;
        let mut in_review_elsewhere = false;
        if let (Some(article), Some(target)) = (&existing, options.target) {
            pairing = self.ledger.topic(article.id, target.topic).await?;
            if pairing.is_some() {
                current = self.ledger.current_state(article.id, target.topic).await?;
            } else {
                in_review_elsewhere = !self.repository.topics_for(article.id).await?.is_empty();
            }
        }

        let excluded = match (options.target, record.journal_id()) {
            (Some(target), Some(journal)) if pairing.is_none() && !options.override_not_list => {
                self.registry.is_excluded(journal, target.board, target.cycle).await?
            }
            _ => false,
        };

        let subject = Subject {
            record,
            existing: existing.as_ref(),
            topic: pairing.as_ref().map(|article_topic| TopicSnapshot { article_topic, current: current.as_ref() }),
            in_review_elsewhere,
            excluded,
        };
        let classification = classify(&subject, options, now)?;

        if options.test_mode {
            return Ok((existing.map(|a| a.id), classification));
        }

        let operation = format!("commit {}", record.source_id);
        let article_id = retry_with_backoff(&operation, self.settings.retry_max_wait, || {
            self.repository.commit(classification.change.clone())
        })
        .await?;
        Ok((Some(article_id), classification))
    }

    /// Queue correction and retraction counterparts published in the same
    /// core journal
    ///
    /// A lookup failure becomes an error action on `record` and the next
    /// candidate is still checked.
    async fn collect_followups(
        &self,
        record: &NormalizedRecord,
        article_id: Option<ArticleId>,
        options: &BatchOptions,
        log: &mut BatchLog,
        followups: &mut FollowupCollector,
    ) {
        let (Some(target), Some(journal)) = (options.target, record.journal_id()) else {
            return;
        };
        let candidates: Vec<SourceId> = followups.candidates(record).into_iter().cloned().collect();
        if candidates.is_empty() {
            return;
        }
        match self.registry.is_core(journal, target.board).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                self.followup_failed(record, article_id, log, err);
                return;
            }
        }

        for candidate in candidates {
            match self.same_journal_unheld(&candidate, journal).await {
                Ok(true) => {
                    if followups.add(candidate.clone()) {
                        job_debug!(JobKind::current(), "🔗 {} queued as follow-up of {}", candidate, record.source_id);
                    }
                }
                Ok(false) => {}
                Err(err) => self.followup_failed(record, article_id, log, err),
            }
        }
    }

    /// The candidate is not held yet and PubMed places it in `journal`
    async fn same_journal_unheld(&self, candidate: &SourceId, journal: &JournalId) -> ImportResult<bool> {
        if self.repository.find_by_source_id(candidate).await?.is_some() {
            return Ok(false);
        }
        Ok(self.source.journal_of(candidate).await?.as_ref() == Some(journal))
    }

    fn followup_failed(&self, record: &NormalizedRecord, article_id: Option<ArticleId>, log: &mut BatchLog, err: ImportError) {
        job_warn!(JobKind::current(), "⚠️ Follow-up lookup for {} failed: {}", record.source_id, err);
        log.error(&record.source_id, article_id, format!("Checking for related articles: {err}"));
    }
}
