//! Core types used throughout the import system

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

pub mod article;
pub mod batch;
pub mod status;

pub use article::*;
pub use batch::*;
pub use status::*;

/// Global job kind - set once at startup
static JOB_KIND: OnceLock<JobKind> = OnceLock::new();

/// Which entry point the running process is serving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Interactive or scripted import batch
    Import,
    /// Scheduled refresh of articles modified upstream
    Refresh,
    /// Scheduled check for identifiers the source no longer resolves
    DropCheck,
}

impl JobKind {
    pub fn init_import() -> &'static JobKind {
        JOB_KIND.get_or_init(|| JobKind::Import)
    }

    pub fn init_refresh() -> &'static JobKind {
        JOB_KIND.get_or_init(|| JobKind::Refresh)
    }

    pub fn init_drop_check() -> &'static JobKind {
        JOB_KIND.get_or_init(|| JobKind::DropCheck)
    }

    /// Get the global job kind, falling back to `Import` when never initialized
    pub fn current() -> &'static JobKind {
        static FALLBACK: JobKind = JobKind::Import;
        JOB_KIND.get().unwrap_or(&FALLBACK)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Import => write!(f, "import"),
            JobKind::Refresh => write!(f, "refresh"),
            JobKind::DropCheck => write!(f, "drop-check"),
        }
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = SharedError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| SharedError::InvalidId { input: s.to_string() })
            }
        }
    };
}

numeric_id!(
    /// Repository key of an article
    ArticleId
);
numeric_id!(
    /// Repository key of an article/topic association
    ArticleTopicId
);
numeric_id!(
    /// Repository key of one state in a topic's history
    StateId
);
numeric_id!(
    /// Editorial board
    BoardId
);
numeric_id!(
    /// Board-scoped review topic
    TopicId
);
numeric_id!(
    /// Board meeting an article can be placed on the agenda of
    MeetingId
);
numeric_id!(
    /// Entry in the board decision vocabulary
    DecisionId
);
numeric_id!(
    /// User on whose behalf an operation runs
    UserId
);

/// Unique identifier for an import batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an article in the bibliographic source (a PubMed ID)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    const MAX_DIGITS: usize = 10;

    pub fn parse(input: &str) -> SharedResult<Self> {
        let trimmed = input.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= Self::MAX_DIGITS
            && trimmed.chars().all(|c| c.is_ascii_digit());
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(SharedError::InvalidSourceId { input: input.to_string() })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SourceId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SourceId {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SourceId> for String {
    fn from(value: SourceId) -> Self {
        value.0
    }
}

/// NLM unique identifier of a journal
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalId(String);

impl JournalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JournalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review cycle: a month, stored as its first day
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cycle(NaiveDate);

impl Cycle {
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn from_ym(year: i32, month: u32) -> SharedResult<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| SharedError::InvalidCycle { input: format!("{year:04}-{month:02}") })
    }

    /// First month strictly after the month containing `today`
    pub fn following(today: NaiveDate) -> Self {
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        Self::from_ym(year, month).unwrap_or_else(|_| Self::from_date(today))
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Cycle {
    type Err = SharedError;

    /// Accepts `YYYY-MM` or `YYYY-MM-DD`; the day is normalized to the 1st.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }
        NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| SharedError::InvalidCycle { input: s.to_string() })
    }
}

impl TryFrom<String> for Cycle {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cycle> for String {
    fn from(value: Cycle) -> Self {
        value.to_string()
    }
}
