//! Shared logging utilities for consistent tracing across import jobs

use crate::types::JobKind;
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Initialize tracing for the current job kind
///
/// The job kind must be set with one of the `JobKind::init_*` functions first;
/// otherwise lines are attributed to the interactive import job.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = match JobKind::current() {
        JobKind::Import => format!("importer={base_level},shared={base_level},reqwest=warn"),
        JobKind::Refresh | JobKind::DropCheck => {
            format!("importer={base_level},shared={base_level},reqwest=warn,hyper=warn")
        }
    };

    // A second init (tests, embedded use) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for job-aware info logging
#[macro_export]
macro_rules! job_info {
    ($job:expr, $($arg:tt)*) => {
        tracing::info!(
            job = %$job,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for job-aware warning logging
#[macro_export]
macro_rules! job_warn {
    ($job:expr, $($arg:tt)*) => {
        tracing::warn!(
            job = %$job,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for job-aware error logging
#[macro_export]
macro_rules! job_error {
    ($job:expr, $($arg:tt)*) => {
        tracing::error!(
            job = %$job,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for job-aware debug logging
#[macro_export]
macro_rules! job_debug {
    ($job:expr, $($arg:tt)*) => {
        tracing::debug!(
            job = %$job,
            timestamp = shared::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(job: &JobKind, details: &str) {
    info!(
        job = %job,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(job: &JobKind, reason: &str) {
    info!(
        job = %job,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(job: &JobKind, context: &str, error: &dyn std::fmt::Display) {
    error!(
        job = %job,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(job: &JobKind, message: &str) {
    info!(
        job = %job,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

/// Contextual logging helper for progress updates
pub fn log_progress(job: &JobKind, action: &str, details: &str) {
    info!(
        job = %job,
        timestamp = format_timestamp(),
        "📋 {}: {}",
        action,
        details
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_display() {
        assert_eq!(JobKind::Import.to_string(), "import");
        assert_eq!(JobKind::Refresh.to_string(), "refresh");
        assert_eq!(JobKind::DropCheck.to_string(), "drop-check");
    }

    #[test]
    fn test_timestamp_format() {
        let stamp = format_timestamp();
        // HH:MM:SS.mmm
        assert_eq!(stamp.len(), 12);
        assert_eq!(&stamp[2..3], ":");
        assert_eq!(&stamp[8..9], ".");
    }
}
