//! Importer configuration
//!
//! Settings are loaded from:
//! 1. `.env` file in the current directory or parent directories (if present)
//! 2. System environment variables
//!
//! Environment variables take precedence over .env file values, and command
//! line flags take precedence over both.
//!
//! ## Variables
//! - `EBMS_DATA_PATH`: article store file (default `./data/ebms.json`)
//! - `PUBMED_EUTILS_URL`: E-utilities root URL
//! - `NCBI_API_KEY`: optional NCBI API key
//! - `PUBMED_CHUNK_SIZE`, `PUBMED_CHUNK_PAUSE_MS`, `PUBMED_FETCH_CONCURRENCY`: fetch pacing
//! - `IMPORT_RETRY_MAX_WAIT_MS`: retry budget for transient failures

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{ImportError, ImportResult};
use crate::orchestrator::FetchSettings;

pub const DEFAULT_DATA_PATH: &str = "./data/ebms.json";
pub const DEFAULT_EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Clone, PartialEq)]
pub struct ImporterConfig {
    pub data_path: PathBuf,
    pub eutils_url: Url,
    pub api_key: Option<String>,
    pub fetch: FetchSettings,
}

impl ImporterConfig {
    /// Load from `.env` and the process environment
    pub fn from_env() -> ImportResult<Self> {
        // Silently ignored when no .env file exists
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ImportResult<Self> {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = FetchSettings::default();

        let data_path: PathBuf = value("EBMS_DATA_PATH").unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()).into();
        let eutils_url = parse_url(&value("PUBMED_EUTILS_URL").unwrap_or_else(|| DEFAULT_EUTILS_URL.to_string()))?;
        let api_key = value("NCBI_API_KEY");

        let chunk_size = number("PUBMED_CHUNK_SIZE", value("PUBMED_CHUNK_SIZE"), defaults.chunk_size)?;
        let concurrency = number("PUBMED_FETCH_CONCURRENCY", value("PUBMED_FETCH_CONCURRENCY"), defaults.concurrency)?;
        if chunk_size == 0 {
            return Err(ImportError::config("PUBMED_CHUNK_SIZE must be at least 1"));
        }
        if concurrency == 0 {
            return Err(ImportError::config("PUBMED_FETCH_CONCURRENCY must be at least 1"));
        }
        let chunk_pause = millis("PUBMED_CHUNK_PAUSE_MS", value("PUBMED_CHUNK_PAUSE_MS"), defaults.chunk_pause)?;
        let retry_max_wait = millis("IMPORT_RETRY_MAX_WAIT_MS", value("IMPORT_RETRY_MAX_WAIT_MS"), defaults.retry_max_wait)?;

        Ok(Self {
            data_path,
            eutils_url,
            api_key,
            fetch: FetchSettings { chunk_size, chunk_pause, concurrency, retry_max_wait },
        })
    }

    pub fn with_data_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.data_path = path;
        }
        self
    }

    pub fn with_eutils_url(mut self, url: Option<&str>) -> ImportResult<Self> {
        if let Some(url) = url {
            self.eutils_url = parse_url(url)?;
        }
        Ok(self)
    }
}

/// E-utilities root; must be an absolute http(s) URL
pub fn parse_url(raw: &str) -> ImportResult<Url> {
    let url = Url::parse(raw).map_err(|err| ImportError::config(format!("PUBMED_EUTILS_URL {raw:?}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ImportError::config(format!("PUBMED_EUTILS_URL scheme {scheme} is not http(s)"))),
    }
}

fn number<T: FromStr>(key: &str, raw: Option<String>, default: T) -> ImportResult<T> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|_| ImportError::config(format!("{key} must be a whole number, got {raw:?}"))),
        None => Ok(default),
    }
}

fn millis(key: &str, raw: Option<String>, default: Duration) -> ImportResult<Duration> {
    match raw {
        Some(_) => number::<u64>(key, raw, 0).map(Duration::from_millis),
        None => Ok(default),
    }
}
