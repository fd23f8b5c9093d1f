//! Matching fetched records back to the identifiers that were requested
//!
//! Sources may omit identifiers, return one twice, or return records nobody
//! asked for. `reconcile` turns whatever came back into exactly one outcome
//! per requested identifier plus a list of surplus failures.

use std::collections::{HashMap, HashSet};

use shared::{FetchOutcome, SourceId};

pub const NOT_RETURNED: &str = "No article with this Pubmed ID was returned by Pubmed";
pub const ALREADY_RECEIVED: &str = "Article already received";
pub const UNREQUESTED: &str = "Received unrequested article";

#[derive(Debug, Default)]
pub struct Reconciled {
    /// One outcome per requested identifier
    pub outcomes: HashMap<SourceId, FetchOutcome>,
    /// Failures for records that do not answer a request, in arrival order
    pub surplus: Vec<FetchOutcome>,
}

impl Reconciled {
    pub fn take(&mut self, id: &SourceId) -> FetchOutcome {
        self.outcomes
            .remove(id)
            .unwrap_or_else(|| FetchOutcome::failed(id.clone(), NOT_RETURNED))
    }
}

pub fn reconcile(requested: &[SourceId], returned: Vec<FetchOutcome>) -> Reconciled {
    let wanted: HashSet<&SourceId> = requested.iter().collect();
    let mut reconciled = Reconciled::default();

    for outcome in returned {
        let id = outcome.source_id().clone();
        if !wanted.contains(&id) {
            reconciled.surplus.push(FetchOutcome::failed(id, UNREQUESTED));
            continue;
        }
        let held_success = reconciled.outcomes.get(&id).map(|held| matches!(held, FetchOutcome::Found(_)));
        match held_success {
            None => {
                reconciled.outcomes.insert(id, outcome);
            }
            Some(true) => reconciled.surplus.push(FetchOutcome::failed(id, ALREADY_RECEIVED)),
            // A later success beats an earlier failure for the same id
            Some(false) => {
                if matches!(outcome, FetchOutcome::Found(_)) {
                    reconciled.outcomes.insert(id, outcome);
                }
            }
        }
    }

    for id in requested {
        if !reconciled.outcomes.contains_key(id) {
            reconciled.outcomes.insert(id.clone(), FetchOutcome::failed(id.clone(), NOT_RETURNED));
        }
    }
    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ArticleMetadata, NormalizedRecord};

    fn id(raw: &str) -> SourceId {
        SourceId::parse(raw).unwrap()
    }

    fn found(raw: &str) -> FetchOutcome {
        FetchOutcome::Found(NormalizedRecord {
            source_id: id(raw),
            metadata: ArticleMetadata::default(),
            related: Vec::new(),
            citation_status: None,
        })
    }

    fn reason(outcome: &FetchOutcome) -> Option<&str> {
        match outcome {
            FetchOutcome::Failed(failure) => Some(failure.reason.as_str()),
            FetchOutcome::Found(_) => None,
        }
    }

    #[test]
    fn test_missing_ids_get_not_returned_failure() {
        let mut reconciled = reconcile(&[id("1"), id("2")], vec![found("1")]);
        assert!(matches!(reconciled.take(&id("1")), FetchOutcome::Found(_)));
        assert_eq!(reason(&reconciled.take(&id("2"))), Some(NOT_RETURNED));
        assert!(reconciled.surplus.is_empty());
    }

    #[test]
    fn test_duplicate_and_unrequested_records() {
        let reconciled = reconcile(&[id("1")], vec![found("1"), found("1"), found("9")]);
        let reasons: Vec<_> = reconciled.surplus.iter().map(|o| (o.source_id().clone(), reason(o))).collect();
        assert_eq!(
            reasons,
            vec![(id("1"), Some(ALREADY_RECEIVED)), (id("9"), Some(UNREQUESTED))]
        );
    }

    #[test]
    fn test_connector_failures_pass_through() {
        let failure = FetchOutcome::failed(id("3"), "Missing PMID");
        let mut reconciled = reconcile(&[id("3")], vec![failure]);
        assert_eq!(reason(&reconciled.take(&id("3"))), Some("Missing PMID"));
    }
}
