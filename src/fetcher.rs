//! Category fetcher
//!
//! Authenticated call to one category sub-service. Failures never escape as
//! errors: they come back as a `CategoryResult` carrying a non-`Ok` status.

use crate::config::AppConfig;
use crate::models::{Category, CategoryOutput, CategoryResult, CategoryStatus, QuoteRequest};
use crate::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait::async_trait]
pub trait CategoryFetcher: Send + Sync {
    async fn fetch(&self, category: Category, request: &QuoteRequest) -> CategoryResult;
}

pub struct HttpCategoryFetcher {
    client: Client,
    config: Arc<AppConfig>,
}

impl HttpCategoryFetcher {
    pub fn new(config: Arc<AppConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self { client, config })
    }
}

/// Body text from a 2xx sub-service answer.
///
/// `{"Result": ..}` is unwrapped; a bare sentinel string is a failure; any
/// other body is taken as-is.
fn interpret_body(category: Category, body: &str) -> CategoryResult {
    if let Ok(output) = serde_json::from_str::<CategoryOutput>(body) {
        return CategoryResult::ok(category, output.result);
    }

    match body.trim() {
        s if s == CategoryStatus::BadRequest.sentinel() => {
            CategoryResult::failed(category, CategoryStatus::BadRequest)
        }
        s if s == CategoryStatus::UpstreamError.sentinel() => {
            CategoryResult::failed(category, CategoryStatus::UpstreamError)
        }
        s => CategoryResult::ok(category, s),
    }
}

#[async_trait::async_trait]
impl CategoryFetcher for HttpCategoryFetcher {
    async fn fetch(&self, category: Category, request: &QuoteRequest) -> CategoryResult {
        let url = format!("{}{}", self.config.service_url(category), category.path());

        let mut query = vec![("ticker", request.ticker.as_str())];
        if let Some(key) = request.write_key() {
            query.push(("writekey", key));
        }

        let response = match self
            .client
            .get(&url)
            .bearer_auth(&self.config.pass_hash)
            .query(&query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(category = %category, "Sub-service request failed: {}", e);
                return CategoryResult::failed(category, CategoryStatus::UpstreamError);
            }
        };

        let status = response.status();
        if status.is_client_error() {
            warn!(category = %category, status = %status, "Sub-service rejected request");
            return CategoryResult::failed(category, CategoryStatus::BadRequest);
        }
        if !status.is_success() {
            warn!(category = %category, status = %status, "Sub-service error");
            return CategoryResult::failed(category, CategoryStatus::UpstreamError);
        }

        match response.text().await {
            Ok(body) => {
                debug!(category = %category, bytes = body.len(), "Fetched category");
                interpret_body(category, &body)
            }
            Err(e) => {
                warn!(category = %category, "Failed to read sub-service body: {}", e);
                CategoryResult::failed(category, CategoryStatus::UpstreamError)
            }
        }
    }
}
