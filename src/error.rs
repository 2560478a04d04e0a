//! Error type shared by the stacking engines and the Immich client.

use thiserror::Error;

/// Errors raised while grouping, ranking or talking to the asset service.
#[derive(Debug, Error)]
pub enum StackError {
    /// The criteria configuration is malformed.
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Some assets could not be keyed by the configured criteria.
    #[error(
        "Some photos do not match the criteria you provided ({key}). Consider refining your \
         criteria. If the criteria was not intended to match all files, set SKIP_MATCH_MISS \
         to skip processing of those photos.\n{}",
        format_samples(.samples)
    )]
    CriteriaMismatch {
        /// The pattern or key that failed to match.
        key: String,
        /// A few offending values or file names.
        samples: Vec<String>,
    },

    /// An asset record returned by the service is missing a required field.
    #[error("Invalid asset record: {0}")]
    InvalidAsset(String),

    /// The asset list could not be retrieved.
    #[error("Failed to fetch assets: {0}")]
    Fetch(String),

    /// The service rejected a stack assignment.
    #[error("Stack submission failed with status {}: {message}", format_status(.status))]
    Submission {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Response body or transport error text.
        message: String,
    },

    /// Invalid runtime configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

fn format_samples(samples: &[String]) -> String {
    samples
        .iter()
        .map(|s| format!("\t{}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_status(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
