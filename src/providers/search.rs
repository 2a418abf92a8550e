//! Annotation search client
//!
//! Posts `query=<text>` form-encoded with the service bearer token. The body
//! is either `{"results": [..]}` or plain text; both become one annotation string.

use super::AnnotationSearch;
use crate::error::AggregatorError;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub struct HttpAnnotationSearch {
    client: Client,
    url: String,
    pass_hash: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<String>,
}

impl HttpAnnotationSearch {
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
impl AnnotationSearch for HttpAnnotationSearch {
    async fn annotate(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.pass_hash)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| {
                warn!("Annotation search failed: {}", e);
                AggregatorError::UpstreamUnavailable(format!("annotation search: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "annotation search returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;

        Ok(match serde_json::from_str::<SearchResponse>(&body) {
            Ok(parsed) => parsed.results.join(" "),
            Err(_) => body.trim().to_string(),
        })
    }
}
