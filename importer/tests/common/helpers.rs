//! Test helpers and builder patterns for importer tests
//!
//! `OrchestratorBuilder` wires an orchestrator entirely from mocks for unit
//! tests; `TestHelpers` pairs a scripted record source with a real in-memory
//! store for end-to-end batch tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use importer::services::RealArticleStore;
use importer::traits::{MockArticleRepository, MockJournalRegistry, MockRecordSource, MockStateLedger};
use importer::{BatchOrchestrator, FetchSettings, StateLedger};
use shared::{ArticleId, FetchOutcome, ImportRequest, NormalizedRecord, SourceId, StatusCode, TopicId};

use super::fixtures::TestFixtures;

/// Type alias for test orchestrator with all mocks
pub type TestOrchestrator =
    BatchOrchestrator<MockRecordSource, MockArticleRepository, MockStateLedger, MockJournalRegistry>;

/// Scripted source in front of the real store
pub type StoreOrchestrator = BatchOrchestrator<MockRecordSource, RealArticleStore, RealArticleStore, RealArticleStore>;

/// Builder pattern for creating test orchestrators from mocks
///
/// Only the ledger and registry get permissive defaults; the source and the
/// repository are left bare so each test states exactly what it expects.
pub struct OrchestratorBuilder {
    source: MockRecordSource,
    repository: MockArticleRepository,
    ledger: MockStateLedger,
    registry: MockJournalRegistry,
    settings: FetchSettings,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        let mut ledger = MockStateLedger::new();
        let mut registry = MockJournalRegistry::new();

        ledger.expect_topic().returning(|_, _| Ok(None)).times(0..);
        ledger.expect_current_state().returning(|_, _| Ok(None)).times(0..);

        registry.expect_is_excluded().returning(|_, _, _| Ok(false)).times(0..);
        registry.expect_is_core().returning(|_, _| Ok(false)).times(0..);

        Self {
            source: MockRecordSource::new(),
            repository: MockArticleRepository::new(),
            ledger,
            registry,
            settings: TestHelpers::fast_settings(),
        }
    }

    pub fn with_settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Configure the record source mock with a setup function
    pub fn with_source<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockRecordSource),
    {
        setup(&mut self.source);
        self
    }

    /// Configure the article repository mock with a setup function
    pub fn with_repository<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockArticleRepository),
    {
        setup(&mut self.repository);
        self
    }

    /// Repository that holds nothing and accepts every write
    pub fn with_empty_repository(self) -> Self {
        self.with_repository(|repository| {
            let next = AtomicU64::new(0);
            repository.expect_find_by_source_id().returning(|_| Ok(None)).times(0..);
            repository.expect_topics_for().returning(|_| Ok(Vec::new())).times(0..);
            repository
                .expect_commit()
                .returning(move |_| Ok(ArticleId::new(next.fetch_add(1, Ordering::SeqCst) + 1)))
                .times(0..);
            repository.expect_record_batch().returning(|_| Ok(())).times(0..);
        })
    }

    /// Build the orchestrator with all configured mocks
    pub fn build(self) -> TestOrchestrator {
        BatchOrchestrator::new(
            Arc::new(self.source),
            Arc::new(self.repository),
            Arc::new(self.ledger),
            Arc::new(self.registry),
        )
        .with_fetch_settings(self.settings)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// No pause between chunks and a short retry budget
    pub fn fast_settings() -> FetchSettings {
        FetchSettings {
            chunk_size: 100,
            chunk_pause: Duration::ZERO,
            concurrency: 1,
            retry_max_wait: Duration::from_millis(50),
        }
    }

    /// Source that answers every fetch from `records`, in the order asked
    pub fn source_serving(records: Vec<NormalizedRecord>) -> MockRecordSource {
        let mut source = MockRecordSource::new();
        let served = records.clone();
        source
            .expect_fetch()
            .returning(move |ids: &[SourceId]| {
                Ok(ids
                    .iter()
                    .filter_map(|id| served.iter().find(|r| &r.source_id == id))
                    .cloned()
                    .map(FetchOutcome::Found)
                    .collect())
            })
            .times(0..);
        source
            .expect_journal_of()
            .returning(move |id: &SourceId| {
                Ok(records.iter().find(|r| &r.source_id == id).and_then(|r| r.metadata.journal_id.clone()))
            })
            .times(0..);
        source.expect_modified_on().returning(|_| Ok(Vec::new())).times(0..);
        source
    }

    /// In-memory store with the standard boards and journals registered
    ///
    /// JCO is core for the follow-up board; the predatory journal is excluded
    /// for that board from January 2020.
    pub async fn seeded_store() -> Arc<RealArticleStore> {
        let store = Arc::new(RealArticleStore::in_memory());
        store.add_board(TestFixtures::board(), "Adult Treatment", true).await.unwrap();
        store.add_board(TestFixtures::quiet_board(), "Pediatric Treatment", false).await.unwrap();
        store.add_journal(TestFixtures::jco(), "Journal of clinical oncology").await.unwrap();
        store.add_journal(TestFixtures::lancet_oncology(), "The Lancet. Oncology").await.unwrap();
        store.add_journal(TestFixtures::predatory(), "International Journal of Everything").await.unwrap();
        store.set_core(&TestFixtures::jco(), TestFixtures::board()).await.unwrap();
        store.set_core(&TestFixtures::jco(), TestFixtures::quiet_board()).await.unwrap();
        store
            .exclude_journal(
                &TestFixtures::predatory(),
                TestFixtures::board(),
                chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                Some(TestFixtures::user()),
            )
            .await
            .unwrap();
        store
    }

    pub fn store_orchestrator(source: MockRecordSource, store: &Arc<RealArticleStore>) -> StoreOrchestrator {
        BatchOrchestrator::new(Arc::new(source), store.clone(), store.clone(), store.clone())
            .with_fetch_settings(Self::fast_settings())
    }

    /// Regular import of `ids` for the standard board, topic and cycle
    pub fn topic_request(ids: &[&str]) -> ImportRequest {
        let mut request = ImportRequest::for_topic(
            TestFixtures::ids(ids),
            TestFixtures::board(),
            TestFixtures::topic(),
            TestFixtures::cycle(),
        );
        request.user = Some(TestFixtures::user());
        request
    }

    /// Status codes of an article's history for a topic, oldest first
    pub async fn history(store: &RealArticleStore, source_id: &str, topic: TopicId) -> Vec<StatusCode> {
        let article = store.article(&TestFixtures::id(source_id)).await.unwrap().expect("article is stored");
        let Some(pairing) = store.topic(article.id, topic).await.unwrap() else {
            return Vec::new();
        };
        store.history(pairing.id).await.unwrap().iter().map(|s| s.value.code()).collect()
    }

    /// Status of the single current state, checking there is exactly one
    pub async fn current(store: &RealArticleStore, source_id: &str, topic: TopicId) -> Option<StatusCode> {
        let article = store.article(&TestFixtures::id(source_id)).await.unwrap()?;
        let pairing = store.topic(article.id, topic).await.unwrap()?;
        let history = store.history(pairing.id).await.unwrap();
        let current: Vec<_> = history.iter().filter(|s| s.current).collect();
        assert_eq!(current.len(), 1, "exactly one current state for {source_id}");
        Some(current[0].value.code())
    }
}
