//! PubMed E-utilities connector

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use shared::{FetchOutcome, JournalId, SourceId};
use url::Url;

use super::pubmed_xml;
use super::retry::retry_with_backoff;
use crate::error::{ImportError, ImportResult};
use crate::traits::RecordSource;

/// Upper bound on identifiers returned by one modification-date search
const ESEARCH_RETMAX: &str = "50000000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Real implementation of RecordSource against NCBI E-utilities
pub struct RealPubmedSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry_max_wait: Duration,
}

impl RealPubmedSource {
    /// Create a connector for the given E-utilities base URL
    ///
    /// # Parameters
    /// - `base_url`: E-utilities root, e.g. `https://eutils.ncbi.nlm.nih.gov/entrez/eutils`
    /// - `api_key`: optional NCBI key, raises the request rate limit
    /// - `retry_max_wait`: how long transient failures are retried
    pub fn new(base_url: &Url, api_key: Option<String>, retry_max_wait: Duration) -> ImportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("ebms-importer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key,
            retry_max_wait,
        })
    }

    fn endpoint(&self, utility: &str) -> String {
        format!("{}/{utility}", self.base_url)
    }

    fn with_key<'a>(&'a self, mut params: Vec<(&'a str, String)>) -> Vec<(&'a str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Turn a non-success status into an error, marking throttling and
    /// server faults as worth retrying
    async fn body(response: reqwest::Response) -> ImportResult<String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }
        let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        Err(ImportError::SourceError { message: format!("E-utilities returned {status}"), transient })
    }

    async fn efetch(&self, ids: &[SourceId]) -> ImportResult<String> {
        let id_list = ids.iter().map(SourceId::as_str).collect::<Vec<_>>().join(",");
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("rettype", "medline".to_string()),
            ("retmode", "xml".to_string()),
            ("id", id_list),
        ]);
        let response = self.client.post(self.endpoint("efetch.fcgi")).form(&params).send().await?;
        Self::body(response).await
    }

    async fn esearch(&self, term: &str) -> ImportResult<String> {
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("retmax", ESEARCH_RETMAX.to_string()),
            ("term", term.to_string()),
        ]);
        let response = self.client.get(self.endpoint("esearch.fcgi")).query(&params).send().await?;
        Self::body(response).await
    }
}

#[async_trait::async_trait]
impl RecordSource for RealPubmedSource {
    async fn fetch(&self, ids: &[SourceId]) -> ImportResult<Vec<FetchOutcome>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(count = ids.len(), "Fetching PubMed records");
        let xml = retry_with_backoff("efetch", self.retry_max_wait, || self.efetch(ids)).await?;
        pubmed_xml::parse_efetch(&xml)
    }

    async fn journal_of(&self, id: &SourceId) -> ImportResult<Option<JournalId>> {
        let outcomes = self.fetch(std::slice::from_ref(id)).await?;
        Ok(outcomes.into_iter().find_map(|outcome| match outcome {
            FetchOutcome::Found(record) if &record.source_id == id => record.metadata.journal_id,
            _ => None,
        }))
    }

    async fn modified_on(&self, day: NaiveDate) -> ImportResult<Vec<SourceId>> {
        let term = format!("{}[MDAT]", day.format("%Y/%m/%d"));
        let xml = retry_with_backoff("esearch", self.retry_max_wait, || self.esearch(&term)).await?;
        let ids = pubmed_xml::parse_esearch(&xml)?;
        tracing::debug!(%day, count = ids.len(), "PubMed modification search");
        Ok(ids)
    }
}
