//! Headline search client

use super::NewsSource;
use crate::error::AggregatorError;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

pub struct HttpNewsSource {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct HeadlineResponse {
    #[serde(default)]
    results: Vec<Headline>,
}

#[derive(Debug, Deserialize)]
struct Headline {
    #[serde(default)]
    title: String,
    #[allow(dead_code)]
    #[serde(default)]
    link: Option<String>,
}

impl HttpNewsSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl NewsSource for HttpNewsSource {
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| {
                error!("Headline search failed: {}", e);
                AggregatorError::UpstreamUnavailable(format!("headline search: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "headline search returned {}",
                response.status()
            )));
        }

        let body: HeadlineResponse = response.json().await.map_err(|e| {
            AggregatorError::UpstreamUnavailable(format!("headline search parse error: {}", e))
        })?;

        let headlines: Vec<String> = body
            .results
            .into_iter()
            .map(|h| h.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(limit)
            .collect();

        debug!(query = %query, count = headlines.len(), "Collected headlines");
        Ok(headlines)
    }
}
