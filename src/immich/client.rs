use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use super::{ApiSettings, SearchRequest, SearchResponse, StackAssignment, api_base};
use crate::error::StackError;
use crate::stacking::Asset;
use crate::stacking::runner::AssetService;

const BACKOFF_BASE_MS: u64 = 500;

/// Blocking client for the Immich REST API.
pub struct ImmichClient {
    client: Client,
    api_url: String,
    settings: ApiSettings,
}

impl ImmichClient {
    pub fn new(settings: ApiSettings) -> Result<Self, StackError> {
        let api_url = api_base(&settings.url)?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&settings.key)
            .map_err(|_| StackError::Config("API key is not a valid header value".to_string()))?;
        headers.insert("x-api-key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(ImmichClient {
            client,
            api_url,
            settings,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send, retrying connection failures and timeouts with exponential backoff.
    fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, reqwest::Error> {
        let mut attempt = 0;
        loop {
            match build().send() {
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.settings.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Request failed ({}), retrying in {:?} ({}/{})",
                        e,
                        delay,
                        attempt + 1,
                        self.settings.max_retries
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_page(&self, page: u64) -> Result<SearchResponse, StackError> {
        let url = format!("{}/search/metadata", self.api_url);
        let request = SearchRequest {
            size: self.settings.page_size,
            page,
            with_stacked: true,
        };

        let response = self
            .send(|| self.client.post(&url).json(&request))
            .map_err(|e| StackError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StackError::Fetch(format!("{} {}", status.as_u16(), body)));
        }

        response
            .json::<SearchResponse>()
            .map_err(|e| StackError::Fetch(format!("malformed search response: {}", e)))
    }
}

impl AssetService for ImmichClient {
    fn fetch_assets(&self) -> Result<Vec<Asset>, StackError> {
        info!("Fetching assets:");
        info!("   Page size: {}", self.settings.page_size);

        let mut assets = Vec::new();
        let mut pages = 0;
        let mut next = Some(1);

        while let Some(page) = next {
            let response = self.fetch_page(page)?;
            pages += 1;
            debug!("   Page {}: {} assets", page, response.assets.items.len());
            next = response.assets.next()?;
            assets.extend(response.assets.items);
        }

        info!("   Pages: {}", pages);
        info!("   Assets: {}", assets.len());

        Ok(assets)
    }

    fn submit_stack(&self, parent_id: &str, child_ids: &[String]) -> Result<(), StackError> {
        let url = format!("{}/assets", self.api_url);
        let payload = StackAssignment {
            ids: child_ids,
            stack_parent_id: parent_id,
        };

        let response = self
            .send(|| self.client.put(&url).json(&payload))
            .map_err(|e| StackError::Submission {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StackError::Submission {
                status: Some(status.as_u16()),
                message: response.text().unwrap_or_default(),
            })
        }
    }
}

/// Delay before retry number `attempt` (0 based): 0.5s, 1s, 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16)))
}
