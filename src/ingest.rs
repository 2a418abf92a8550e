//! Downstream ingestion of composite results

use crate::error::AggregatorError;
use crate::models::PromptInference;
use crate::Result;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, inference: &PromptInference) -> Result<()>;
}

/// Payload posted as `info=<json>`; empty narrations are omitted
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct IngestPayload {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stock_performance: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub financial_health: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub news_summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub company_desc: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub technical_analysis: String,
}

impl From<&PromptInference> for IngestPayload {
    fn from(inference: &PromptInference) -> Self {
        Self {
            stock_performance: inference.stock_performance.clone(),
            financial_health: inference.financial_health.clone(),
            news_summary: inference.news_summary.clone(),
            company_desc: inference.company_desc.clone(),
            technical_analysis: inference.technical_analysis.clone(),
        }
    }
}

/// `X:BTCUSD` → `BTCUSD`, `I:SPX` → `SPX`
pub fn ingest_ticker(ticker: &str) -> &str {
    ticker
        .strip_prefix("X:")
        .or_else(|| ticker.strip_prefix("I:"))
        .unwrap_or(ticker)
}

pub struct HttpIngestor {
    client: Client,
    url: String,
    pass_hash: String,
}

impl HttpIngestor {
    pub fn new(url: impl Into<String>, pass_hash: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            pass_hash: pass_hash.into(),
        })
    }
}

#[async_trait::async_trait]
impl Ingestor for HttpIngestor {
    async fn ingest(&self, inference: &PromptInference) -> Result<()> {
        let payload = serde_json::to_string(&IngestPayload::from(inference))?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.pass_hash)
            .form(&[("info", payload.as_str())])
            .send()
            .await
            .map_err(|e| {
                warn!("Ingestion post failed: {}", e);
                AggregatorError::UpstreamUnavailable(format!("ingestor: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "ingestor returned {}",
                response.status()
            )));
        }

        info!(ticker = %ingest_ticker(&inference.ticker), "Posted composite to ingestor");
        Ok(())
    }
}
