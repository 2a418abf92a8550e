//! Service configuration
//!
//! Built once at startup and shared as `Arc<AppConfig>`. Nothing else in the
//! crate reads process environment.

use crate::auth::pass_hash;
use crate::error::AggregatorError;
use crate::models::Category;
use crate::Result;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LLM_URL: &str = "http://127.0.0.1:8090/llm";
const DEFAULT_NEWS_SEARCH_URL: &str = "http://127.0.0.1:8070/news";
const DEFAULT_INGESTOR_URL: &str = "http://127.0.0.1:6001/ingestor";
const DEFAULT_POLYGON_URL: &str = "https://api.polygon.io";

const STK_TEMPLATE: &str = "Summarize the recent stock performance of the asset below in two or three sentences for a retail investor. ";
const FIN_TEMPLATE: &str = "Summarize the financial health of the company below from its balance sheet in two or three sentences. ";
const NEWS_TEMPLATE: &str = "Summarize the overall tone and key themes of the recent headlines below in two or three sentences. ";
const DESC_TEMPLATE: &str = "Describe what the company below does in two or three plain sentences. ";
const TA_TEMPLATE: &str = "Explain the technical posture implied by the indicators below in two or three sentences. ";

/// Write keys that gate side effects
#[derive(Debug, Clone, Default)]
pub struct WriteKeys {
    /// Sub-service raw-document persistence
    pub raw: Option<String>,
    /// Ingestion posting of the composite
    pub knowledge_base: Option<String>,
    /// Ticker-result upsert of the composite
    pub market_report: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// SHA-256 hex digest of `PASS_KEY`; the only bearer token accepted
    pub pass_hash: String,
    pub write_keys: WriteKeys,

    pub service_urls: HashMap<Category, String>,
    pub templates: HashMap<Category, String>,

    pub llm_url: String,
    pub search_url: Option<String>,
    pub news_search_url: String,
    pub ingestor_url: String,

    pub polygon_api_key: String,
    pub polygon_base_url: String,

    pub database_url: Option<String>,

    pub request_timeout: Duration,
    pub upstream_timeout: Duration,
    pub max_concurrent_categories: usize,
}

impl AppConfig {
    /// Load from process environment (call after `dotenv`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| AggregatorError::Config(format!("invalid port '{}'", raw)))?,
            None => DEFAULT_PORT,
        };

        let pass_key = get("PASS_KEY")
            .ok_or_else(|| AggregatorError::Config("PASS_KEY is not set".to_string()))?;

        let local = format!("http://127.0.0.1:{}", port);
        let mut service_urls = HashMap::new();
        let mut templates = HashMap::new();
        for category in Category::ALL {
            let prefix = category.tag().to_uppercase();
            let url = get(&format!("{}_SERVICE_URL", prefix)).unwrap_or_else(|| local.clone());
            service_urls.insert(category, url.trim_end_matches('/').to_string());

            let template = get(&format!("{}_TEMPLATE", prefix))
                .unwrap_or_else(|| default_template(category).to_string());
            templates.insert(category, template);
        }

        Ok(Self {
            port,
            pass_hash: pass_hash(&pass_key),
            write_keys: WriteKeys {
                raw: get("WRITE_KEY"),
                knowledge_base: get("KB_WRITE_KEY"),
                market_report: get("MR_WRITE_KEY"),
            },
            service_urls,
            templates,
            llm_url: get("LLM_SERVICE_URL").unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            search_url: get("SEARCH_SERVICE_URL"),
            news_search_url: get("NEWS_SEARCH_URL")
                .unwrap_or_else(|| DEFAULT_NEWS_SEARCH_URL.to_string()),
            ingestor_url: get("INGESTOR_URL").unwrap_or_else(|| DEFAULT_INGESTOR_URL.to_string()),
            polygon_api_key: get("POLYGON_API_KEY")
                .or_else(|| get("API_KEY"))
                .unwrap_or_default(),
            polygon_base_url: get("POLYGON_BASE_URL")
                .unwrap_or_else(|| DEFAULT_POLYGON_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            request_timeout: Duration::from_secs(parse_num(&get, "REQUEST_TIMEOUT_SECS", 60)?),
            upstream_timeout: Duration::from_secs(parse_num(&get, "UPSTREAM_TIMEOUT_SECS", 30)?),
            max_concurrent_categories: parse_num(&get, "MAX_CONCURRENT_CATEGORIES", 5)?.max(1)
                as usize,
        })
    }

    /// Build from literal pairs; handy in tests and the one-shot runner
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::from_lookup(|key| map.get(key).cloned())
    }

    pub fn service_url(&self, category: Category) -> &str {
        self.service_urls
            .get(&category)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn template(&self, category: Category) -> &str {
        self.templates
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| default_template(category))
    }
}

fn default_template(category: Category) -> &'static str {
    match category {
        Category::Price => STK_TEMPLATE,
        Category::Financials => FIN_TEMPLATE,
        Category::News => NEWS_TEMPLATE,
        Category::Description => DESC_TEMPLATE,
        Category::TechnicalAnalysis => TA_TEMPLATE,
    }
}

fn parse_num<G>(get: &G, key: &str, default: u64) -> Result<u64>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AggregatorError::Config(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_pairs(&[("PASS_KEY", "secret")]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.service_url(Category::News), "http://127.0.0.1:8080");
        assert_eq!(config.max_concurrent_categories, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.search_url.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.pass_hash, pass_hash("secret"));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_pairs(&[
            ("PASS_KEY", "secret"),
            ("API_PORT", "9000"),
            ("FIN_SERVICE_URL", "http://fin.internal/"),
            ("TA_TEMPLATE", "Explain: "),
            ("MR_WRITE_KEY", "mr"),
            ("KB_WRITE_KEY", ""),
            ("MAX_CONCURRENT_CATEGORIES", "0"),
            ("POSTGRES_URL", "postgres://localhost/digest"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.service_url(Category::Financials), "http://fin.internal");
        assert_eq!(config.service_url(Category::Price), "http://127.0.0.1:9000");
        assert_eq!(config.template(Category::TechnicalAnalysis), "Explain: ");
        assert_eq!(config.write_keys.market_report.as_deref(), Some("mr"));
        assert!(config.write_keys.knowledge_base.is_none());
        assert_eq!(config.max_concurrent_categories, 1);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/digest")
        );
    }

    #[test]
    fn test_missing_pass_key() {
        let err = AppConfig::from_pairs(&[]).unwrap_err();
        assert!(matches!(err, AggregatorError::Config(_)));
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(AppConfig::from_pairs(&[("PASS_KEY", "s"), ("PORT", "http")]).is_err());
        assert!(
            AppConfig::from_pairs(&[("PASS_KEY", "s"), ("REQUEST_TIMEOUT_SECS", "soon")]).is_err()
        );
    }
}
