//! Aggregate request orchestration
//!
//! VALIDATE → FAN OUT (fetch + narrate per category) → ASSEMBLE → PERSIST? → AUDIT
//!
//! Category failures never fail the request; they leave that narrative empty.

mod pipeline;

pub use pipeline::{annotation_query, CategoryOutcome, CategoryPipeline, CategoryState};

use crate::audit::EventTrail;
use crate::config::AppConfig;
use crate::error::AggregatorError;
use crate::fetcher::CategoryFetcher;
use crate::inference::NarrativeModel;
use crate::ingest::Ingestor;
use crate::models::{Category, PromptInference, QuoteRequest};
use crate::providers::AnnotationSearch;
use crate::store::InsightStore;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one aggregate request
#[derive(Debug)]
pub struct AggregateOutcome {
    pub inference: PromptInference,
    /// Per-category outcomes in composite field order
    pub categories: Vec<CategoryOutcome>,
    pub audit_id: Uuid,
    /// Set when a write-key side effect failed; the composite is still valid
    pub persistence_error: Option<AggregatorError>,
}

pub struct Orchestrator {
    config: Arc<AppConfig>,
    fetcher: Arc<dyn CategoryFetcher>,
    model: Arc<dyn NarrativeModel>,
    search: Arc<dyn AnnotationSearch>,
    ingestor: Arc<dyn Ingestor>,
    store: Arc<dyn InsightStore>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<AppConfig>,
        fetcher: Arc<dyn CategoryFetcher>,
        model: Arc<dyn NarrativeModel>,
        search: Arc<dyn AnnotationSearch>,
        ingestor: Arc<dyn Ingestor>,
        store: Arc<dyn InsightStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            model,
            search,
            ingestor,
            store,
        }
    }

    pub async fn handle(&self, request: QuoteRequest, request_ip: &str) -> Result<AggregateOutcome> {
        let ticker = request.ticker.trim().to_string();
        if ticker.is_empty() {
            return Err(AggregatorError::MissingParameter("ticker".to_string()));
        }
        let request = QuoteRequest::new(ticker.clone(), request.write_key);

        info!(ticker = %ticker, ip = %request_ip, "Aggregate request");

        let mut trail = EventTrail::new(&ticker, request_ip);
        trail.record("queried ticker");

        let categories = self.fan_out(&request).await;

        let mut inference = PromptInference::empty(&ticker);
        for outcome in &categories {
            inference.set(outcome.category, outcome.state.narrative().to_string());
            trail.extend(outcome.events.iter().cloned());
        }

        let degraded = inference.empty_categories();
        if !degraded.is_empty() {
            warn!(ticker = %ticker, degraded = ?degraded, "Composite has empty categories");
        }

        let persistence_error = self.apply_write_key(&request, &inference, &mut trail).await;

        trail.record("sent prompt inference response");
        debug!(ticker = %ticker, events = trail.events().len(), "Closing audit trail");
        let record = trail.finish();
        let audit_id = record.audit_id;
        if let Err(e) = self.store.record_audit(&record).await {
            warn!(ticker = %ticker, "Failed to write audit record: {}", e);
        }

        info!(
            ticker = %ticker,
            audit_id = %audit_id,
            execution_time_ms = record.execution_time_ms,
            "Aggregate request complete"
        );

        Ok(AggregateOutcome {
            inference,
            categories,
            audit_id,
            persistence_error,
        })
    }

    /// Run every category under the worker bound and the request deadline.
    ///
    /// Output order is `Category::ALL` order regardless of completion order.
    async fn fan_out(&self, request: &QuoteRequest) -> Vec<CategoryOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_categories));
        let deadline = Instant::now() + self.config.request_timeout;
        let year = Utc::now().format("%Y").to_string();

        let mut set = JoinSet::new();
        let mut spawned = HashMap::new();
        for category in Category::ALL {
            let pipeline = CategoryPipeline {
                fetcher: Arc::clone(&self.fetcher),
                model: Arc::clone(&self.model),
                search: Arc::clone(&self.search),
                template: self.config.template(category).to_string(),
                year: year.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            let request = request.clone();

            let handle = set.spawn(async move {
                // Permit held for the whole category
                let _permit = semaphore.acquire_owned().await.ok();
                pipeline.run(category, request).await
            });
            spawned.insert(handle.id(), category);
        }

        let mut slots: Vec<Option<CategoryOutcome>> = vec![None; Category::ALL.len()];
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    let index = outcome.category.index();
                    slots[index] = Some(outcome);
                }
                Ok(Some(Err(e))) => match spawned.get(&e.id()) {
                    Some(category) => {
                        warn!(category = %category, "Category task failed: {}", e);
                        slots[category.index()] = Some(CategoryOutcome::task_failed(*category));
                    }
                    None => warn!("Untracked category task failed: {}", e),
                },
                Ok(None) => break,
                Err(_) => {
                    warn!(ticker = %request.ticker, "Request deadline reached, aborting unfinished categories");
                    set.abort_all();
                    break;
                }
            }
        }

        Category::ALL
            .iter()
            .zip(slots)
            .map(|(category, slot)| slot.unwrap_or_else(|| CategoryOutcome::aborted(*category)))
            .collect()
    }

    /// Write-key side effects; only the first failure is reported
    async fn apply_write_key(
        &self,
        request: &QuoteRequest,
        inference: &PromptInference,
        trail: &mut EventTrail,
    ) -> Option<AggregatorError> {
        let key = request.write_key()?;
        let keys = &self.config.write_keys;

        if keys.knowledge_base.as_deref() == Some(key) {
            return match self.ingestor.ingest(inference).await {
                Ok(()) => {
                    trail.record("posted composite to data ingestor");
                    None
                }
                Err(e) => {
                    warn!(ticker = %inference.ticker, "Ingestion failed: {}", e);
                    trail.record("data ingestor post failed");
                    Some(AggregatorError::PersistenceFailure(format!("ingestion: {}", e)))
                }
            };
        }

        if keys.market_report.as_deref() == Some(key) {
            return match self.store.upsert_inference(inference).await {
                Ok(()) => {
                    trail.record("stored ticker result");
                    None
                }
                Err(e) => {
                    warn!(ticker = %inference.ticker, "Ticker result upsert failed: {}", e);
                    trail.record("ticker result store failed");
                    Some(e)
                }
            };
        }

        None
    }
}
