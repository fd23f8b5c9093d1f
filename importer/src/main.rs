//! Main entry point for the importer binary
//!
//! Wires the real PubMed connector and the file-backed article store into the
//! batch orchestrator and runs one job: an import batch, the nightly data
//! refresh, or the drop check.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use importer::{
    services::{RealArticleStore, RealPubmedSource},
    BatchOrchestrator, ImporterConfig,
};
use shared::{
    job_debug, job_info, logging, BoardId, Cycle, DecisionId, ImportRequest, ImportType, JobKind, MeetingId,
    PlacementKind, PlacementRequest, SourceId, StatusCode, TopicId, UserId,
};

type Orchestrator = BatchOrchestrator<RealPubmedSource, RealArticleStore, RealArticleStore, RealArticleStore>;

/// Imports PubMed articles into the editorial review store
#[derive(Parser)]
#[command(name = "importer")]
#[command(about = "Imports PubMed articles for editorial board review")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Article store file (overrides EBMS_DATA_PATH)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// E-utilities root URL (overrides PUBMED_EUTILS_URL)
    #[arg(long, global = true)]
    pub eutils_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import a batch of PubMed IDs
    Import(ImportArgs),
    /// Mark articles PubMed modified and re-import them
    Refresh {
        /// Run date, defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// List held articles PubMed no longer returns
    Drops,
}

#[derive(ClapArgs)]
pub struct ImportArgs {
    /// PubMed IDs, in processing order
    #[arg(required_unless_present = "ids_file")]
    pub ids: Vec<SourceId>,

    /// File of PubMed IDs separated by whitespace or commas, read after any given inline
    #[arg(long)]
    pub ids_file: Option<PathBuf>,

    /// Import type: regular, fast-track, special-search, data-refresh or internal
    #[arg(long = "type")]
    pub import_type: Option<ImportType>,

    #[arg(long)]
    pub board: Option<BoardId>,

    #[arg(long)]
    pub topic: Option<TopicId>,

    /// Review cycle, YYYY-MM
    #[arg(long)]
    pub cycle: Option<Cycle>,

    #[arg(long)]
    pub user: Option<UserId>,

    /// Comment stored on the batch and on new states
    #[arg(long)]
    pub comment: Option<String>,

    /// Board manager comment for the article/topic pairing
    #[arg(long)]
    pub mgr_comment: Option<String>,

    /// Import even from journals the board excluded
    #[arg(long)]
    pub override_not_list: bool,

    #[arg(long)]
    pub fast_track: bool,

    /// Fast-track destination: published, passed-bm-review, passed-full-review, bma, on-agenda, final-board-decision
    #[arg(long, value_parser = parse_placement)]
    pub placement: Option<PlacementKind>,

    /// Meeting for on-agenda placements
    #[arg(long)]
    pub meeting: Option<MeetingId>,

    /// Decision for final board decision placements
    #[arg(long)]
    pub decision: Option<DecisionId>,

    /// Board manager sub-status for bma placements
    #[arg(long)]
    pub bma_disposition: Option<StatusCode>,

    /// Comment attached to the last fast-track state
    #[arg(long)]
    pub placement_comment: Option<String>,

    #[arg(long)]
    pub special_search: bool,

    #[arg(long)]
    pub core_journals: bool,

    #[arg(long)]
    pub hi_priority: bool,

    /// Classify without writing anything
    #[arg(long)]
    pub test_mode: bool,

    /// Full-text file name to attach
    #[arg(long)]
    pub full_text: Option<String>,

    /// Internal tag; repeat for several
    #[arg(long = "internal-tag")]
    pub internal_tags: Vec<String>,

    #[arg(long)]
    pub internal_comment: Option<String>,
}

impl ImportArgs {
    fn into_request(self) -> anyhow::Result<ImportRequest> {
        let mut article_ids = self.ids;
        if let Some(path) = &self.ids_file {
            article_ids.extend(read_ids(path)?);
        }
        let placement = self.placement.map(|kind| PlacementRequest {
            placement: kind,
            meeting: self.meeting,
            decision: self.decision,
            bma_disposition: self.bma_disposition,
            comments: self.placement_comment,
        });
        Ok(ImportRequest {
            article_ids,
            import_type: self.import_type,
            board: self.board,
            topic: self.topic,
            cycle: self.cycle,
            user: self.user,
            import_comments: self.comment,
            mgr_comment: self.mgr_comment,
            override_not_list: self.override_not_list,
            fast_track: self.fast_track,
            special_search: self.special_search,
            core_journals_search: self.core_journals,
            hi_priority: self.hi_priority,
            test_mode: self.test_mode,
            placement,
            full_text: self.full_text,
            internal_tags: self.internal_tags,
            internal_comment: self.internal_comment,
        })
    }
}

fn read_ids(path: &Path) -> anyhow::Result<Vec<SourceId>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| SourceId::parse(token).with_context(|| format!("in {}", path.display())))
        .collect()
}

fn parse_placement(raw: &str) -> Result<PlacementKind, String> {
    match raw.trim().to_lowercase().replace('_', "-").as_str() {
        "published" => Ok(PlacementKind::Published),
        "passed-bm-review" => Ok(PlacementKind::PassedBmReview),
        "passed-full-review" => Ok(PlacementKind::PassedFullReview),
        "bma" => Ok(PlacementKind::Bma),
        "on-agenda" => Ok(PlacementKind::OnAgenda),
        "final-board-decision" => Ok(PlacementKind::FinalBoardDecision),
        other => Err(format!("unknown placement {other:?}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let job = match &args.command {
        Command::Import(_) => JobKind::init_import(),
        Command::Refresh { .. } => JobKind::init_refresh(),
        Command::Drops => JobKind::init_drop_check(),
    };
    logging::init_tracing(Some(&args.log_level));

    let config = ImporterConfig::from_env()?
        .with_data_path(args.data.clone())
        .with_eutils_url(args.eutils_url.as_deref())?;
    logging::log_startup(
        job,
        &format!("store {} via {}", config.data_path.display(), config.eutils_url),
    );

    let store = Arc::new(RealArticleStore::open(config.data_path.clone()).await?);
    let source = Arc::new(RealPubmedSource::new(&config.eutils_url, config.api_key.clone(), config.fetch.retry_max_wait)?);
    let orchestrator: Orchestrator = BatchOrchestrator::new(source, store.clone(), store.clone(), store)
        .with_fetch_settings(config.fetch);
    job_debug!(job, "Fetch settings: {:?}", orchestrator.settings());

    // Ctrl+C stops the job between identifiers; work already committed stays
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(JobKind::current(), "Received Ctrl+C signal");
                signal_cancel.cancel();
            }
            Err(err) => {
                logging::log_error(JobKind::current(), "Signal handling", &err);
            }
        }
    });

    match args.command {
        Command::Import(import) => {
            let batch = orchestrator.process_with_cancel(import.into_request()?, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&batch)?);
            if batch.success {
                logging::log_success(job, &format!("Batch {} imported", batch.id));
            } else {
                logging::log_error(job, "Import", &"no identifier was processed successfully");
            }
        }
        Command::Refresh { today } => {
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let report = orchestrator.refresh_stale(today, &cancel).await?;
            println!("{}", report.render());
            logging::log_success(job, &format!("{} articles refreshed", report.replaced()));
        }
        Command::Drops => {
            let report = orchestrator.find_drops(&cancel).await?;
            println!("{}", report.render());
            job_info!(job, "🔍 {} articles no longer returned by PubMed", report.missing.len());
            logging::log_success(job, "Drop check finished");
        }
    }

    Ok(())
}
