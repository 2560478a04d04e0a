pub mod client;

pub use client::ImmichClient;

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StackError;
use crate::stacking::Asset;

/// Connection settings for the Immich API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub url: String,
    pub key: String,
    pub page_size: usize,
    /// Retries for connection and timeout errors.
    pub max_retries: u32,
    pub timeout: Duration,
}

impl ApiSettings {
    pub fn new(url: &str, key: &str) -> Self {
        ApiSettings {
            url: url.to_string(),
            key: key.to_string(),
            page_size: 1000,
            max_retries: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Reduce any user supplied URL to `scheme://host[:port]/api`.
pub fn api_base(url: &str) -> Result<String, StackError> {
    let parsed =
        Url::parse(url).map_err(|e| StackError::Config(format!("invalid API URL {}: {}", url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| StackError::Config(format!("API URL {} has no host", url)))?;
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    Ok(format!("{}://{}{}/api", parsed.scheme(), host, port))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchRequest {
    pub size: usize,
    pub page: u64,
    pub with_stacked: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub assets: AssetPage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssetPage {
    pub items: Vec<Asset>,
    #[serde(default)]
    pub next_page: Option<Value>,
}

impl AssetPage {
    /// Next page number. The service sends it as a string.
    pub fn next(&self) -> Result<Option<u64>, StackError> {
        match &self.next_page {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| StackError::Fetch(format!("unexpected nextPage {:?}", s))),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| StackError::Fetch(format!("unexpected nextPage {}", n))),
            Some(other) => Err(StackError::Fetch(format!("unexpected nextPage {}", other))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StackAssignment<'a> {
    pub ids: &'a [String],
    pub stack_parent_id: &'a str,
}
