//! Tests for the JSON-file article store

use chrono::{NaiveDate, Utc};
use shared::{
    ArticleId, BatchId, BoardId, Cycle, ImportRequest, JournalId, PlainStatus, StateValue, StatusCode, TopicId,
};

use super::common::{cycle, id, metadata, new_article_change};
use crate::core::{ArticleWrite, BatchLog, BatchOptions, NewState};
use crate::error::ImportError;
use crate::services::store::RealArticleStore;
use crate::traits::{ArticleRepository, JournalRegistry, StateLedger};

fn date(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

#[tokio::test]
async fn test_commit_creates_article_topic_and_states() {
    let store = RealArticleStore::in_memory();
    let change = new_article_change(
        "100",
        vec![NewState::plain(PlainStatus::READY_INIT_REVIEW), NewState::plain(PlainStatus::PUBLISHED)],
    );

    let article_id = store.commit(change).await.unwrap();

    let article = store.find_by_source_id(&id("100")).await.unwrap().unwrap();
    assert_eq!(article.id, article_id);
    assert!(article.data_checked.is_some());
    assert_eq!(article.topics.len(), 1);

    let topics = store.topics_for(article_id).await.unwrap();
    assert_eq!(topics[0].cycle, cycle());
    let history = store.history(topics[0].id).await.unwrap();
    let codes: Vec<_> = history.iter().map(|s| s.value.code()).collect();
    assert_eq!(codes, vec![StatusCode::ReadyInitReview, StatusCode::Published]);
    assert_eq!(history.iter().filter(|s| s.current).count(), 1);

    let current = store.current_state(article_id, TopicId::new(5)).await.unwrap().unwrap();
    assert_eq!(current.value.code(), StatusCode::Published);
    assert!(store.current_state(article_id, TopicId::new(6)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_commit_leaves_store_untouched() {
    let store = RealArticleStore::in_memory();
    // Second state would regress the review, so the whole change is refused
    let change = new_article_change(
        "100",
        vec![NewState::plain(PlainStatus::PUBLISHED), NewState::plain(PlainStatus::READY_INIT_REVIEW)],
    );

    let err = store.commit(change).await.unwrap_err();
    assert!(matches!(err, ImportError::RegressiveTransition { .. }));
    assert!(store.find_by_source_id(&id("100")).await.unwrap().is_none());
    assert!(store.source_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_metadata_and_stamps_check() {
    let store = RealArticleStore::in_memory();
    let article_id = store.commit(new_article_change("100", vec![NewState::plain(PlainStatus::READY_INIT_REVIEW)])).await.unwrap();
    let first = store.find_by_source_id(&id("100")).await.unwrap().unwrap();

    let mut refresh = new_article_change("100", Vec::new());
    refresh.topic = None;
    refresh.article = ArticleWrite::Refresh { id: article_id, metadata: Some(metadata("Corrected title")) };
    refresh.internal_tags = vec!["qa".into(), "qa".into()];
    refresh.internal_comment = Some("checked by hand".into());
    store.commit(refresh).await.unwrap();

    let article = store.find_by_source_id(&id("100")).await.unwrap().unwrap();
    assert_eq!(article.metadata.title, "Corrected title");
    assert!(article.updated.is_some());
    assert!(article.data_checked >= first.data_checked);
    assert_eq!(article.internal_tags.len(), 1);
    assert_eq!(article.internal_comments[0].body, "checked by hand");
    assert_eq!(article.topics.len(), 1);
}

#[tokio::test]
async fn test_add_state_keeps_one_current_and_refuses_regression() {
    let store = RealArticleStore::in_memory();
    let article_id = store.commit(new_article_change("100", vec![NewState::plain(PlainStatus::READY_INIT_REVIEW)])).await.unwrap();
    let pairing = store.topic(article_id, TopicId::new(5)).await.unwrap().unwrap();

    let placed = store
        .add_state(pairing.id, NewState::new(StateValue::OnAgenda { meeting: shared::MeetingId::new(4) }), None)
        .await
        .unwrap();
    assert!(placed.current);
    assert_eq!(placed.board, BoardId::new(1));

    let codes: Vec<_> = store.history(pairing.id).await.unwrap().iter().map(|s| s.value.code()).collect();
    assert_eq!(codes, vec![StatusCode::ReadyInitReview, StatusCode::Published, StatusCode::OnAgenda]);

    let err = store.add_state(pairing.id, NewState::plain(PlainStatus::PUBLISHED), None).await.unwrap_err();
    assert!(matches!(err, ImportError::RegressiveTransition { .. }));
    assert_eq!(store.history(pairing.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_exclusion_effective_from_start_date() {
    let store = RealArticleStore::in_memory();
    let journal = JournalId::new("8309333");
    store.add_journal(journal.clone(), "J Clin Oncol").await.unwrap();
    store.exclude_journal(&journal, BoardId::new(1), date("2020-01-01"), None).await.unwrap();

    let june: Cycle = "2020-06".parse().unwrap();
    let january: Cycle = "2020-01".parse().unwrap();
    let earlier: Cycle = "2019-12".parse().unwrap();
    assert!(store.is_excluded(&journal, BoardId::new(1), june).await.unwrap());
    assert!(store.is_excluded(&journal, BoardId::new(1), january).await.unwrap());
    assert!(!store.is_excluded(&journal, BoardId::new(1), earlier).await.unwrap());
    assert!(!store.is_excluded(&journal, BoardId::new(2), june).await.unwrap());
    assert!(!store.is_excluded(&JournalId::new("0000"), BoardId::new(1), june).await.unwrap());
}

#[tokio::test]
async fn test_core_requires_board_auto_imports() {
    let store = RealArticleStore::in_memory();
    let journal = JournalId::new("8309333");
    store.add_journal(journal.clone(), "J Clin Oncol").await.unwrap();
    store.set_core(&journal, BoardId::new(1)).await.unwrap();
    store.set_core(&journal, BoardId::new(2)).await.unwrap();
    store.add_board(BoardId::new(1), "Breast", true).await.unwrap();
    store.add_board(BoardId::new(2), "Lung", false).await.unwrap();

    assert!(store.is_core(&journal, BoardId::new(1)).await.unwrap());
    assert!(!store.is_core(&journal, BoardId::new(2)).await.unwrap());
    assert!(!store.is_core(&journal, BoardId::new(3)).await.unwrap());
}

#[tokio::test]
async fn test_modification_stamps_drive_staleness() {
    let store = RealArticleStore::in_memory();
    store.commit(new_article_change("100", Vec::new())).await.unwrap();
    store.commit(new_article_change("200", Vec::new())).await.unwrap();
    assert!(store.latest_modification().await.unwrap().is_none());
    assert!(store.stale_source_ids().await.unwrap().is_empty());

    let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
    let changed = store.mark_modified(&[id("100"), id("999")], tomorrow).await.unwrap();
    assert_eq!(changed, 1);
    assert_eq!(store.mark_modified(&[id("100")], tomorrow).await.unwrap(), 0);

    assert_eq!(store.latest_modification().await.unwrap(), Some(tomorrow));
    assert_eq!(store.stale_source_ids().await.unwrap(), vec![id("100")]);
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ebms.json");

    {
        let store = RealArticleStore::open(&path).await.unwrap();
        store.commit(new_article_change("100", vec![NewState::plain(PlainStatus::READY_INIT_REVIEW)])).await.unwrap();

        let request = ImportRequest::data_refresh(vec![id("100")], "nightly");
        let options = BatchOptions::from_request(&request).unwrap();
        let batch = BatchLog::new().finish(BatchId::new(), &options, Vec::new(), Utc::now());
        store.record_batch(&batch).await.unwrap();
    }

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());

    let reopened = RealArticleStore::open(&path).await.unwrap();
    let article = reopened.find_by_source_id(&id("100")).await.unwrap().unwrap();
    assert_eq!(article.metadata.title, "Article 100");
    let history = reopened.history(article.topics[0]).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(reopened.batches().await.unwrap().len(), 1);

    // Ids keep counting from where the file left off
    let second = reopened.commit(new_article_change("200", Vec::new())).await.unwrap();
    assert_ne!(second, article.id);
}

#[tokio::test]
async fn test_failed_persist_rolls_back_staged_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ebms.json");
    let store = RealArticleStore::open(&path).await.unwrap();
    let first = store.commit(new_article_change("100", vec![NewState::plain(PlainStatus::READY_INIT_REVIEW)])).await.unwrap();

    // A directory where the temp file goes makes the snapshot write fail
    let staging = path.with_extension("json.tmp");
    std::fs::create_dir(&staging).unwrap();
    let err = store.commit(new_article_change("200", vec![NewState::plain(PlainStatus::READY_INIT_REVIEW)])).await.unwrap_err();
    assert!(matches!(err, ImportError::IoError(_)));
    assert!(store.find_by_source_id(&id("200")).await.unwrap().is_none());
    assert_eq!(store.source_ids().await.unwrap(), vec![id("100")]);

    std::fs::remove_dir(&staging).unwrap();
    let second = store.commit(new_article_change("200", Vec::new())).await.unwrap();
    assert_eq!(second, ArticleId::new(first.value() + 1));

    let reopened = RealArticleStore::open(&path).await.unwrap();
    let article = reopened.find_by_source_id(&id("200")).await.unwrap().unwrap();
    assert_eq!(article.id, second);
    let pairing = reopened.find_by_source_id(&id("100")).await.unwrap().unwrap().topics[0];
    assert_eq!(reopened.history(pairing).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_records_append_without_rewriting_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ebms.json");
    let store = RealArticleStore::open(&path).await.unwrap();
    store.commit(new_article_change("100", Vec::new())).await.unwrap();
    let snapshot = std::fs::read(&path).unwrap();

    let request = ImportRequest::data_refresh(vec![id("100")], "nightly");
    let options = BatchOptions::from_request(&request).unwrap();
    for _ in 0..2 {
        let batch = BatchLog::new().finish(BatchId::new(), &options, Vec::new(), Utc::now());
        store.record_batch(&batch).await.unwrap();
    }

    assert_eq!(std::fs::read(&path).unwrap(), snapshot);
    let log = std::fs::read_to_string(path.with_extension("batches.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 2);

    let recorded = store.batches().await.unwrap();
    let reopened = RealArticleStore::open(&path).await.unwrap();
    let reloaded: Vec<BatchId> = reopened.batches().await.unwrap().iter().map(|b| b.id).collect();
    assert_eq!(reloaded, recorded.iter().map(|b| b.id).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_torn_last_batch_record_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ebms.json");
    let request = ImportRequest::data_refresh(vec![id("100")], "nightly");
    let options = BatchOptions::from_request(&request).unwrap();
    {
        let store = RealArticleStore::open(&path).await.unwrap();
        let batch = BatchLog::new().finish(BatchId::new(), &options, Vec::new(), Utc::now());
        store.record_batch(&batch).await.unwrap();
    }
    let log_path = path.with_extension("batches.jsonl");
    let mut log = std::fs::read_to_string(&log_path).unwrap();
    log.push_str("{\"id\":");
    std::fs::write(&log_path, &log).unwrap();

    let reopened = RealArticleStore::open(&path).await.unwrap();
    assert_eq!(reopened.batches().await.unwrap().len(), 1);

    // A damaged record followed by others is not silently dropped
    log.push('\n');
    std::fs::write(&log_path, &log).unwrap();
    assert!(RealArticleStore::open(&path).await.is_err());
}
