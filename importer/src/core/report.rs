//! Ordered action log and batch assembly

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use shared::{Action, ArticleId, Batch, BatchId, Disposition, SourceId};

use super::options::BatchOptions;

/// Append-only record of what happened to each identifier
#[derive(Debug, Default)]
pub struct BatchLog {
    actions: Vec<Action>,
    /// Identifiers with at least one non-error action
    succeeded: HashSet<SourceId>,
    messages: Vec<String>,
}

impl BatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source_id: &SourceId, article_id: Option<ArticleId>, dispositions: &[Disposition]) {
        if dispositions.iter().any(|d| *d != Disposition::Error) {
            self.succeeded.insert(source_id.clone());
        }
        for disposition in dispositions {
            self.actions.push(Action {
                source_id: source_id.clone(),
                article_id,
                disposition: *disposition,
                message: None,
            });
        }
    }

    pub fn error(&mut self, source_id: &SourceId, article_id: Option<ArticleId>, message: impl Into<String>) {
        self.actions.push(Action {
            source_id: source_id.clone(),
            article_id,
            disposition: Disposition::Error,
            message: Some(message.into()),
        });
    }

    /// Batch-level note, e.g. cancellation or a failed batch record
    pub fn note(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// At least one identifier came through without an error
    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }

    pub fn finish(
        self,
        id: BatchId,
        options: &BatchOptions,
        followup_ids: Vec<SourceId>,
        imported: DateTime<Utc>,
    ) -> Batch {
        let success = self.any_succeeded();
        let target = options.target;
        Batch {
            id,
            import_type: options.import_type,
            board: target.map(|t| t.board),
            topic: target.map(|t| t.topic),
            cycle: target.map(|t| t.cycle),
            imported,
            user: options.user,
            not_list_override: options.override_not_list,
            test_mode: options.test_mode,
            requested_ids: options.article_ids.clone(),
            article_count: options.article_ids.len(),
            success,
            actions: self.actions,
            followup_ids,
            comment: options.comment.clone(),
            messages: self.messages,
        }
    }
}
