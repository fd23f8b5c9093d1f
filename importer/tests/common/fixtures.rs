//! Test fixtures and data for importer tests
//!
//! Consistent boards, topics, journals and PubMed records used across the
//! unit and integration suites.

use shared::{
    ArticleMetadata, Author, BoardId, Cycle, JournalId, NormalizedRecord, PubDate, RelatedReference, RelationKind,
    SourceId, TopicId, UserId,
};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Board that takes follow-up imports
    pub const BOARD: u64 = 1;
    /// Board with follow-up imports switched off
    pub const QUIET_BOARD: u64 = 2;
    pub const TOPIC: u64 = 5;
    pub const OTHER_TOPIC: u64 = 6;
    pub const USER: u64 = 42;

    /// Journal of Clinical Oncology, NLM unique id
    pub const JCO: &'static str = "8309333";
    /// Lancet Oncology
    pub const LANCET_ONCOLOGY: &'static str = "100957246";
    pub const PREDATORY: &'static str = "101616193";

    pub const CYCLE: &'static str = "2020-06";

    pub fn board() -> BoardId {
        BoardId::new(Self::BOARD)
    }

    pub fn quiet_board() -> BoardId {
        BoardId::new(Self::QUIET_BOARD)
    }

    pub fn topic() -> TopicId {
        TopicId::new(Self::TOPIC)
    }

    pub fn other_topic() -> TopicId {
        TopicId::new(Self::OTHER_TOPIC)
    }

    pub fn user() -> UserId {
        UserId::new(Self::USER)
    }

    pub fn cycle() -> Cycle {
        Self::CYCLE.parse().unwrap()
    }

    pub fn jco() -> JournalId {
        JournalId::new(Self::JCO)
    }

    pub fn lancet_oncology() -> JournalId {
        JournalId::new(Self::LANCET_ONCOLOGY)
    }

    pub fn predatory() -> JournalId {
        JournalId::new(Self::PREDATORY)
    }

    pub fn id(raw: &str) -> SourceId {
        SourceId::parse(raw).unwrap()
    }

    pub fn ids(raw: &[&str]) -> Vec<SourceId> {
        raw.iter().map(|r| Self::id(r)).collect()
    }

    /// A plausible record published in `journal`
    pub fn record(id: &str, journal: &JournalId) -> NormalizedRecord {
        NormalizedRecord {
            source_id: Self::id(id),
            metadata: ArticleMetadata {
                title: format!("Randomized trial {id} of adjuvant therapy"),
                authors: vec![Author {
                    last_name: Some("Okafor".into()),
                    forename: Some("Ada".into()),
                    initials: Some("A".into()),
                    collective_name: None,
                }],
                journal_id: Some(journal.clone()),
                journal_title: Some("Journal of clinical oncology".into()),
                brief_journal_title: Some("J Clin Oncol".into()),
                volume: Some("38".into()),
                issue: Some("4".into()),
                pagination: Some("101-110".into()),
                pub_date: PubDate { year: Some("2020".into()), month: Some("Feb".into()), ..PubDate::default() },
                publication_types: vec!["Journal Article".into()],
                abstract_paragraphs: Vec::new(),
            },
            related: Vec::new(),
            citation_status: Some("MEDLINE".into()),
        }
    }

    /// Same record with a corrected title, as PubMed sends after an erratum
    pub fn revised(record: &NormalizedRecord) -> NormalizedRecord {
        let mut revised = record.clone();
        revised.metadata.title = format!("{} (corrected)", record.metadata.title);
        revised
    }

    /// Record referencing `others` with the given relation
    pub fn record_with_related(
        id: &str,
        journal: &JournalId,
        related: &[(&str, RelationKind)],
    ) -> NormalizedRecord {
        let mut record = Self::record(id, journal);
        record.related = related
            .iter()
            .map(|(other, relation)| RelatedReference {
                source_id: Self::id(other),
                relation: relation.clone(),
                citation: Some(format!("J Clin Oncol. 2020;38:{other}")),
            })
            .collect();
        record
    }
}
