//! Core data models for the ticker digest

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Request =================
//

/// Inbound aggregate request; built per call, never persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub ticker: String,
    #[serde(default, rename = "writekey")]
    pub write_key: Option<String>,
}

impl QuoteRequest {
    pub fn new(ticker: impl Into<String>, write_key: Option<String>) -> Self {
        Self {
            ticker: ticker.into(),
            write_key,
        }
    }

    /// Write key, treating an empty string as absent
    pub fn write_key(&self) -> Option<&str> {
        self.write_key.as_deref().filter(|k| !k.is_empty())
    }
}

//
// ================= Categories =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Price,
    Financials,
    News,
    Description,
    TechnicalAnalysis,
}

impl Category {
    /// Every category in composite field order
    pub const ALL: [Category; 5] = [
        Category::Price,
        Category::Financials,
        Category::News,
        Category::Description,
        Category::TechnicalAnalysis,
    ];

    /// Sub-service route for this category
    pub fn path(&self) -> &'static str {
        match self {
            Category::Price => "/stk",
            Category::Financials => "/fin",
            Category::News => "/news",
            Category::Description => "/desc",
            Category::TechnicalAnalysis => "/ta",
        }
    }

    /// Short tag used in event trails and logs
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Price => "stk",
            Category::Financials => "fin",
            Category::News => "news",
            Category::Description => "desc",
            Category::TechnicalAnalysis => "ta",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Category::Price => 0,
            Category::Financials => 1,
            Category::News => 2,
            Category::Description => 3,
            Category::TechnicalAnalysis => 4,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Price => "Price",
            Category::Financials => "Financials",
            Category::News => "News",
            Category::Description => "Description",
            Category::TechnicalAnalysis => "TechnicalAnalysis",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Ok,
    BadRequest,
    UpstreamError,
}

impl CategoryStatus {
    /// Text carried in place of data when a fetch did not succeed
    pub fn sentinel(&self) -> &'static str {
        match self {
            CategoryStatus::Ok => "",
            CategoryStatus::BadRequest => "400 Bad Request",
            CategoryStatus::UpstreamError => "500 Internal Server Error",
        }
    }
}

/// Outcome of one category fetch.
///
/// `raw_text` holds domain data only when `status` is `Ok`; otherwise it is the
/// status sentinel. Use [`CategoryResult::text`] to read it safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResult {
    pub category: Category,
    pub raw_text: String,
    pub status: CategoryStatus,
}

impl CategoryResult {
    pub fn ok(category: Category, raw_text: impl Into<String>) -> Self {
        Self {
            category,
            raw_text: raw_text.into(),
            status: CategoryStatus::Ok,
        }
    }

    pub fn failed(category: Category, status: CategoryStatus) -> Self {
        debug_assert!(status != CategoryStatus::Ok);
        Self {
            category,
            raw_text: status.sentinel().to_string(),
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CategoryStatus::Ok
    }

    pub fn text(&self) -> Option<&str> {
        self.is_ok().then_some(self.raw_text.as_str())
    }
}

//
// ================= Composite =================
//

/// One narrative per category; empty when the category failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PromptInference {
    pub ticker: String,
    pub stock_performance: String,
    pub financial_health: String,
    pub news_summary: String,
    pub company_desc: String,
    pub technical_analysis: String,
}

impl PromptInference {
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, category: Category) -> &str {
        match category {
            Category::Price => &self.stock_performance,
            Category::Financials => &self.financial_health,
            Category::News => &self.news_summary,
            Category::Description => &self.company_desc,
            Category::TechnicalAnalysis => &self.technical_analysis,
        }
    }

    pub fn set(&mut self, category: Category, narrative: String) {
        let slot = match category {
            Category::Price => &mut self.stock_performance,
            Category::Financials => &mut self.financial_health,
            Category::News => &mut self.news_summary,
            Category::Description => &mut self.company_desc,
            Category::TechnicalAnalysis => &mut self.technical_analysis,
        };
        *slot = narrative;
    }

    /// Categories whose narrative is empty
    pub fn empty_categories(&self) -> Vec<Category> {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| self.get(*c).is_empty())
            .collect()
    }
}

//
// ================= Market data =================
//

/// One daily bar from the price provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSample {
    pub date: NaiveDate,
    pub open: Decimal,
    pub close: Decimal,
}

impl PriceSample {
    /// Placeholder for a date the provider had nothing for
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            open: Decimal::ZERO,
            close: Decimal::ZERO,
        }
    }

    /// A zero open means the market produced no bar on that date
    pub fn is_available(&self) -> bool {
        !self.open.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedAccount {
    pub name: String,
    pub total: Decimal,
}

//
// ================= Sub-service output =================
//

/// Body returned by every category sub-service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutput {
    #[serde(rename = "Result")]
    pub result: String,
}

/// Raw category text persisted by the sub-services when the write key matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub category: Category,
    pub ticker: String,
    pub output: CategoryOutput,
}

//
// ================= Audit =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub execution_time_ms: u64,
    pub request_ip: String,
    pub event_sequence: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_inference_field_names() {
        let mut inference = PromptInference::empty("AAPL");
        inference.set(Category::News, "Quiet week".to_string());

        let json = serde_json::to_value(&inference).unwrap();
        assert_eq!(json["Ticker"], "AAPL");
        assert_eq!(json["NewsSummary"], "Quiet week");
        assert_eq!(json["StockPerformance"], "");
        assert_eq!(inference.empty_categories().len(), 4);
    }

    #[test]
    fn test_failed_result_carries_sentinel_only() {
        let result = CategoryResult::failed(Category::News, CategoryStatus::UpstreamError);
        assert_eq!(result.raw_text, "500 Internal Server Error");
        assert_eq!(result.text(), None);

        let result = CategoryResult::ok(Category::News, "headline");
        assert_eq!(result.text(), Some("headline"));
    }

    #[test]
    fn test_category_order_is_stable() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_quote_request_empty_write_key() {
        let request = QuoteRequest::new("AAPL", Some(String::new()));
        assert_eq!(request.write_key(), None);
    }

    #[test]
    fn test_category_output_shape() {
        let body = serde_json::to_string(&CategoryOutput {
            result: "text".into(),
        })
        .unwrap();
        assert_eq!(body, r#"{"Result":"text"}"#);
    }
}
