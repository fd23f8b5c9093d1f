//! Related-article follow-up collection

use std::collections::HashSet;

use shared::{NormalizedRecord, SourceId};

/// Gathers identifiers of corrections and retractions to import in a later batch
pub struct FollowupCollector {
    requested: HashSet<SourceId>,
    ids: Vec<SourceId>,
}

impl FollowupCollector {
    /// Identifiers requested by the current batch never become follow-ups
    pub fn new(requested: &[SourceId]) -> Self {
        Self { requested: requested.iter().cloned().collect(), ids: Vec::new() }
    }

    /// Correction/retraction counterparts of `record` not yet requested or collected
    pub fn candidates<'r>(&self, record: &'r NormalizedRecord) -> Vec<&'r SourceId> {
        let mut seen = HashSet::new();
        record
            .related
            .iter()
            .filter(|r| r.relation.is_correction_or_retraction())
            .map(|r| &r.source_id)
            .filter(|id| *id != &record.source_id)
            .filter(|id| !self.requested.contains(*id) && !self.ids.contains(*id))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Record a confirmed follow-up; returns false if it was already known
    pub fn add(&mut self, id: SourceId) -> bool {
        if self.requested.contains(&id) || self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Follow-ups in first-seen order
    pub fn into_ids(self) -> Vec<SourceId> {
        self.ids
    }
}
