//! One category's path through the aggregate request:
//! fetch → (annotate) → narrate → sanitize

use crate::fetcher::CategoryFetcher;
use crate::inference::{build_prompt, sanitize_narrative, NarrativeModel};
use crate::models::{Category, CategoryResult, CategoryStatus, QuoteRequest};
use crate::providers::AnnotationSearch;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a category ended up; every variant is included in the composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryState {
    /// Fetched and narrated
    Narrated(String),
    /// Fetch failed; narration never attempted
    FetchFailed(CategoryStatus),
    /// Fetch succeeded, narration failed
    NarrationFailed,
    /// Still running at the request deadline
    Aborted,
    /// The category task panicked or was cancelled before producing an outcome
    TaskFailed,
}

impl CategoryState {
    pub fn narrative(&self) -> &str {
        match self {
            CategoryState::Narrated(text) => text,
            _ => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub category: Category,
    pub fetched: Option<CategoryResult>,
    pub state: CategoryState,
    pub events: Vec<String>,
}

impl CategoryOutcome {
    pub fn aborted(category: Category) -> Self {
        Self {
            category,
            fetched: None,
            state: CategoryState::Aborted,
            events: vec![format!("{} aborted at request deadline", category.tag())],
        }
    }

    pub fn task_failed(category: Category) -> Self {
        Self {
            category,
            fetched: None,
            state: CategoryState::TaskFailed,
            events: vec![format!("{} task failed", category.tag())],
        }
    }
}

/// Search query used to annotate a category's prompt; `None` for categories without one
pub fn annotation_query(category: Category, ticker: &str, year: &str) -> Option<String> {
    match category {
        Category::Price => Some(format!("{} financial price information for {}", ticker, year)),
        Category::Financials => Some(format!("{} financials and 10k filings for {}", ticker, year)),
        Category::Description => Some(format!("{} company description", ticker)),
        Category::News | Category::TechnicalAnalysis => None,
    }
}

#[derive(Clone)]
pub struct CategoryPipeline {
    pub fetcher: Arc<dyn CategoryFetcher>,
    pub model: Arc<dyn NarrativeModel>,
    pub search: Arc<dyn AnnotationSearch>,
    pub template: String,
    pub year: String,
}

impl CategoryPipeline {
    pub async fn run(self, category: Category, request: QuoteRequest) -> CategoryOutcome {
        let tag = category.tag();
        let mut events = Vec::new();

        let fetched = self.fetcher.fetch(category, &request).await;
        events.push(format!("queried {} info", tag));

        let Some(raw) = fetched.text() else {
            events.push(format!("{} prompt inference failed", tag));
            return CategoryOutcome {
                category,
                state: CategoryState::FetchFailed(fetched.status),
                fetched: Some(fetched),
                events,
            };
        };

        let annotation = match annotation_query(category, &request.ticker, &self.year) {
            Some(query) => match self.search.annotate(&query).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(category = %category, "Annotation search failed: {}", e);
                    Some(String::new())
                }
            },
            None => None,
        };

        let prompt = build_prompt(&self.template, &request.ticker, raw, annotation.as_deref());
        debug!(category = %category, prompt_len = prompt.len(), "Built prompt");

        let state = match self.model.complete(&prompt).await {
            Ok(text) => {
                events.push(format!("collected {} prompt inference", tag));
                CategoryState::Narrated(sanitize_narrative(&text))
            }
            Err(e) => {
                warn!(category = %category, "Narration failed: {}", e);
                events.push(format!("{} prompt inference failed", tag));
                CategoryState::NarrationFailed
            }
        };

        CategoryOutcome {
            category,
            fetched: Some(fetched),
            state,
            events,
        }
    }
}
