//! Command line and environment configuration.

use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::error::StackError;
use crate::immich::ApiSettings;
use crate::stacking::criteria::{default_criteria, parse_criteria};
use crate::stacking::parent::ParentRanking;
use crate::stacking::runner::RunOptions;

/// Stack related photos in an Immich library.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Immich API key
    #[arg(long, env = "API_KEY", visible_alias = "api_key", hide_env_values = true)]
    pub api_key: String,

    /// Immich server URL; only scheme, host and port are used
    #[arg(
        long,
        env = "API_URL",
        visible_alias = "api_url",
        default_value = "http://immich_server:3001/api"
    )]
    pub api_url: String,

    /// JSON list of grouping criteria
    #[arg(long, env = "CRITERIA")]
    pub criteria: Option<String>,

    /// Skip assets the criteria cannot key instead of failing
    #[arg(long, env = "SKIP_MATCH_MISS", visible_alias = "skip_match_miss",
          action = ArgAction::Set, value_parser = parse_bool, default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub skip_match_miss: bool,

    /// Comma separated substrings promoting a file to stack parent
    #[arg(long, env = "PARENT_PROMOTE", visible_alias = "parent_promote", default_value = "")]
    pub parent_promote: String,

    /// Leave out children that already belong to a stack
    #[arg(long, env = "SKIP_PREVIOUS", visible_alias = "skip_previous",
          action = ArgAction::Set, value_parser = parse_bool, default_value = "true", num_args = 0..=1, default_missing_value = "true")]
    pub skip_previous: bool,

    /// Log the stacks without changing anything
    #[arg(long, env = "DRY_RUN", visible_alias = "dry_run",
          action = ArgAction::Set, value_parser = parse_bool, default_value = "false", num_args = 0..=1, default_missing_value = "true")]
    pub dry_run: bool,

    /// Assets per search page
    #[arg(long, env = "PAGE_SIZE", default_value_t = 1000)]
    pub page_size: usize,

    /// Pause between stack submissions, in milliseconds
    #[arg(long, env = "SUBMIT_DELAY_MS", default_value_t = 100)]
    pub submit_delay_ms: u64,

    /// Retries for failed connections
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// HTTP request timeout, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub run: RunOptions,
}

impl Args {
    pub fn into_settings(self) -> Result<Settings, StackError> {
        if self.api_key.is_empty() {
            return Err(StackError::Config("API key is required".to_string()));
        }
        if self.page_size == 0 {
            return Err(StackError::Config("page size must be positive".to_string()));
        }

        let criteria = match self.criteria.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => parse_criteria(json)?,
            _ => default_criteria(),
        };

        Ok(Settings {
            api: ApiSettings {
                url: self.api_url,
                key: self.api_key,
                page_size: self.page_size,
                max_retries: self.max_retries,
                timeout: Duration::from_secs(self.request_timeout_secs),
            },
            run: RunOptions {
                criteria,
                skip_unmatched: self.skip_match_miss,
                skip_previous: self.skip_previous,
                dry_run: self.dry_run,
                ranking: ParentRanking::new(&self.parent_promote),
                submit_delay: Duration::from_millis(self.submit_delay_ms),
            },
        })
    }
}

/// Lenient boolean parsing for environment style values. Empty means false.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "" | "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        other => Err(format!("invalid boolean value: {}", other)),
    }
}
