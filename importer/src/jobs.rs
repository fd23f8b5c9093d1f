//! Scheduled maintenance jobs
//!
//! Both jobs run through the same orchestrator as interactive imports: the
//! data refresh re-imports articles PubMed reports as modified, and the drop
//! check lists held articles PubMed no longer returns.

use chrono::{Duration, NaiveDate};
use shared::{job_error, job_info, logging, Batch, Disposition, FetchOutcome, ImportRequest, JobKind, SourceId};
use tokio_util::sync::CancellationToken;

use crate::core::reconcile::{reconcile, NOT_RETURNED};
use crate::error::{ImportError, ImportResult};
use crate::orchestrator::BatchOrchestrator;
use crate::traits::{ArticleRepository, JournalRegistry, RecordSource, StateLedger};

/// Comment carried by every data refresh batch
pub const REFRESH_COMMENT: &str = "BATCH REPLACEMENT OF UPDATED ARTICLES FROM PUBMED";

/// Identifiers per data refresh batch
pub const REFRESH_BATCH_SIZE: usize = 100;

/// Days PubMed modification dates are allowed to settle before we trust them
const MODIFICATION_LAG_DAYS: i64 = 7;

/// First day to query when no article carries a modification date yet
pub fn default_refresh_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Outcome of one data refresh run
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Human-readable progress, one line per step
    pub lines: Vec<String>,
    pub days_checked: usize,
    pub articles_marked: usize,
    pub batches: Vec<Batch>,
}

impl RefreshReport {
    fn line(&mut self, line: String) {
        job_info!(JobKind::current(), "{}", line);
        self.lines.push(line);
    }

    pub fn replaced(&self) -> usize {
        self.batches.iter().map(|b| b.ids_with(Disposition::Replaced).len()).sum()
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Held identifiers the source no longer returns
#[derive(Debug, Default, PartialEq)]
pub struct DropReport {
    pub checked: usize,
    pub missing: Vec<SourceId>,
    /// Identifiers that could not be checked, with the reason
    pub unchecked: Vec<(SourceId, String)>,
}

impl DropReport {
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "Checked {} articles: {} no longer returned, {} could not be checked",
            self.checked,
            self.missing.len(),
            self.unchecked.len()
        )];
        lines.extend(self.missing.iter().map(|id| format!("  dropped {id}")));
        lines.extend(self.unchecked.iter().map(|(id, reason)| format!("  unchecked {id}: {reason}")));
        lines.join("\n")
    }
}

impl<S, R, L, J> BatchOrchestrator<S, R, L, J>
where
    S: RecordSource + 'static,
    R: ArticleRepository + 'static,
    L: StateLedger + 'static,
    J: JournalRegistry + 'static,
{
    /// Stamp upstream modification days, then re-import stale articles
    ///
    /// # Parameters
    /// - `today`: the run date; days later than a week before it are left for a later run
    /// - `cancel`: stops between days and between batches
    pub async fn refresh_stale(&self, today: NaiveDate, cancel: &CancellationToken) -> ImportResult<RefreshReport> {
        let mut report = RefreshReport::default();
        let start = self.repository.latest_modification().await?.unwrap_or_else(default_refresh_start);
        let end = today - Duration::days(MODIFICATION_LAG_DAYS);
        report.line(format!("Checking PubMed modifications from {start} through {end}"));

        let mut day = start;
        while day <= end && !cancel.is_cancelled() {
            match self.source.modified_on(day).await {
                Ok(ids) => {
                    let marked = self.repository.mark_modified(&ids, day).await?;
                    report.days_checked += 1;
                    report.articles_marked += marked;
                    report.line(format!("{day}: {} modified in PubMed, {marked} held articles marked", ids.len()));
                }
                Err(err) => {
                    job_error!(JobKind::current(), "❌ Modification search for {} failed: {}", day, err);
                    report.line(format!("{day}: modification search failed, stopping walk: {err}"));
                    break;
                }
            }
            let Some(next) = day.succ_opt() else {
                break;
            };
            day = next;
        }

        let stale = self.repository.stale_source_ids().await?;
        report.line(format!("{} articles need refreshing", stale.len()));

        for chunk in stale.chunks(REFRESH_BATCH_SIZE) {
            if cancel.is_cancelled() {
                report.line("Refresh cancelled".to_string());
                break;
            }
            let request = ImportRequest::data_refresh(chunk.to_vec(), REFRESH_COMMENT);
            let batch = self.process_with_cancel(request, cancel).await?;
            report.line(format!(
                "Batch {}: {} articles, {} replaced, {} errors",
                batch.id,
                batch.article_count,
                batch.ids_with(Disposition::Replaced).len(),
                batch.error_count()
            ));
            report.batches.push(batch);
        }

        report.line(format!("Refresh finished: {} articles replaced", report.replaced()));
        Ok(report)
    }

    /// Fetch every held identifier and report the ones the source dropped
    ///
    /// Nothing is deleted; the report is for an editor to act on.
    pub async fn find_drops(&self, cancel: &CancellationToken) -> ImportResult<DropReport> {
        let ids = self.repository.source_ids().await?;
        logging::log_progress(JobKind::current(), "Drop check", &format!("{} held articles to look up", ids.len()));

        let fetched = self.fetch_all(&ids, cancel).await;
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled { processed: fetched.len() });
        }

        let mut reconciled = reconcile(&ids, fetched);
        let mut report = DropReport { checked: ids.len(), ..DropReport::default() };
        for id in &ids {
            if let FetchOutcome::Failed(failure) = reconciled.take(id) {
                if failure.reason == NOT_RETURNED {
                    report.missing.push(failure.source_id);
                } else {
                    report.unchecked.push((failure.source_id, failure.reason));
                }
            }
        }

        job_info!(
            JobKind::current(),
            "✅ Drop check finished: {} missing, {} unchecked",
            report.missing.len(),
            report.unchecked.len()
        );
        Ok(report)
    }
}
