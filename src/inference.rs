//! Narrative inference
//!
//! Builds the category prompt and sends it to the completion collaborator.

use crate::error::AggregatorError;
use crate::Result;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

/// Completion collaborator
#[async_trait::async_trait]
pub trait NarrativeModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// `template + "For ASSET_NAME: <ticker>\n<raw>"`, plus `"\n<annotation>"` when one applies
pub fn build_prompt(template: &str, ticker: &str, raw: &str, annotation: Option<&str>) -> String {
    let mut prompt = format!("{}For ASSET_NAME: {}\n{}", template, ticker, raw);
    if let Some(annotation) = annotation {
        prompt.push('\n');
        prompt.push_str(annotation);
    }
    prompt
}

/// Strip wrapping braces, then neutralize any left inside
pub fn sanitize_narrative(text: &str) -> String {
    text.trim_matches(|c: char| c == '{' || c == '}')
        .replace(['{', '}'], "|")
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

pub struct HttpNarrativeModel {
    client: Client,
    url: String,
    pass_hash: String,
}

impl HttpNarrativeModel {
    pub fn new(url: impl Into<String>, pass_hash: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            pass_hash: pass_hash.into(),
        })
    }
}

#[async_trait::async_trait]
impl NarrativeModel for HttpNarrativeModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!(prompt_len = prompt.len(), "Calling completion service");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.pass_hash)
            .json(&CompletionRequest { prompt })
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                AggregatorError::UpstreamUnavailable(format!("completion service: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Completion service error response: {}", body);
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "completion service returned {}",
                status
            )));
        }

        Ok(response.text().await?)
    }
}
