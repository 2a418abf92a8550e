//! In-process fakes shared by unit tests

use crate::aggregator::Orchestrator;
use crate::api::ApiState;
use crate::config::AppConfig;
use crate::error::AggregatorError;
use crate::fetcher::CategoryFetcher;
use crate::inference::NarrativeModel;
use crate::ingest::Ingestor;
use crate::models::{Category, CategoryResult, CategoryStatus, PriceSample, PromptInference, QuoteRequest};
use crate::providers::{
    AnnotationSearch, Indicator, IndicatorReading, MarketDataProvider, NewsSource, PriceProvider,
};
use crate::services::CategoryServices;
use crate::store::{InMemoryInsightStore, InsightStore};
use crate::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub(crate) fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Canned sub-service answers; unlisted categories succeed
pub(crate) struct FakeFetcher {
    pub overrides: HashMap<Category, CategoryStatus>,
    pub stall: Option<Category>,
    pub panic_on: Option<Category>,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeFetcher {
    pub fn all_ok() -> Self {
        Self {
            overrides: HashMap::new(),
            stall: None,
            panic_on: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing(category: Category, status: CategoryStatus) -> Self {
        let mut fetcher = Self::all_ok();
        fetcher.overrides.insert(category, status);
        fetcher
    }
}

#[async_trait::async_trait]
impl CategoryFetcher for FakeFetcher {
    async fn fetch(&self, category: Category, request: &QuoteRequest) -> CategoryResult {
        if self.panic_on == Some(category) {
            panic!("{} fetcher blew up", category.tag());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.stall == Some(category) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.overrides.get(&category) {
            Some(status) => CategoryResult::failed(category, *status),
            None => CategoryResult::ok(category, format!("{} raw for {}", category.tag(), request.ticker)),
        }
    }
}

/// Echoes the second prompt line back inside braces
pub(crate) struct EchoModel {
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl EchoModel {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait::async_trait]
impl NarrativeModel for EchoModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(AggregatorError::UpstreamUnavailable("model down".into()));
        }
        let raw = prompt.lines().nth(1).unwrap_or_default();
        Ok(format!("{{narrative of {{{}}}}}", raw))
    }
}

pub(crate) struct FixedSearch;

#[async_trait::async_trait]
impl AnnotationSearch for FixedSearch {
    async fn annotate(&self, query: &str) -> Result<String> {
        Ok(format!("note: {}", query))
    }
}

#[derive(Default)]
pub(crate) struct RecordingIngestor {
    pub posted: Mutex<Vec<PromptInference>>,
}

#[async_trait::async_trait]
impl Ingestor for RecordingIngestor {
    async fn ingest(&self, inference: &PromptInference) -> Result<()> {
        self.posted.lock().unwrap().push(inference.clone());
        Ok(())
    }
}

/// Vendor fake: fixed previous close of 172.50, configurable year-ago open
pub(crate) struct FakeMarket {
    pub year_ago_open: Decimal,
}

impl FakeMarket {
    pub fn new(year_ago_open: &str) -> Self {
        Self {
            year_ago_open: dec(year_ago_open),
        }
    }
}

#[async_trait::async_trait]
impl PriceProvider for FakeMarket {
    async fn previous_close(&self, _ticker: &str) -> Result<PriceSample> {
        Ok(PriceSample {
            date: ymd(2024, 3, 7),
            open: dec("170"),
            close: dec("172.50"),
        })
    }

    async fn daily_open_close(&self, _ticker: &str, date: NaiveDate) -> Result<PriceSample> {
        Ok(PriceSample {
            date,
            open: self.year_ago_open,
            close: self.year_ago_open,
        })
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FakeMarket {
    async fn financials_dump(&self, _ticker: &str) -> Result<String> {
        Ok("{map[balance_sheet:map[assets:{Assets 100 USD 2.5e+6} \
            equity_attributable_to_noncontrolling_interest:{X 1 USD 0}]]}"
            .to_string())
    }

    async fn ticker_description(&self, _ticker: &str) -> Result<String> {
        Ok(" Apple designs {consumer} hardware. ".to_string())
    }

    async fn indicator(&self, _ticker: &str, indicator: Indicator) -> Result<Option<IndicatorReading>> {
        Ok(match indicator {
            Indicator::Rsi { .. } => None,
            _ => Some(IndicatorReading {
                value: dec("1.5"),
                signal: Some(dec("0.5")),
                histogram: Some(dec("1")),
            }),
        })
    }
}

pub(crate) struct FakeNews;

#[async_trait::async_trait]
impl NewsSource for FakeNews {
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        Ok((0..10)
            .map(|i| format!("{} headline {}", query, i))
            .take(limit)
            .collect())
    }
}

pub(crate) fn fake_services(year_ago_open: &str) -> CategoryServices {
    let market = Arc::new(FakeMarket::new(year_ago_open));
    CategoryServices::new(market.clone(), market, Arc::new(FakeNews))
}

/// Config with `PASS_KEY=secret` plus the given overrides
pub(crate) fn fake_config(extra: &[(&str, &str)]) -> Arc<AppConfig> {
    let mut pairs = vec![("PASS_KEY", "secret")];
    pairs.extend_from_slice(extra);
    Arc::new(AppConfig::from_pairs(&pairs).unwrap())
}

/// Full API state over in-process fakes and an in-memory store
pub(crate) fn fake_state(fetcher: FakeFetcher, extra: &[(&str, &str)]) -> ApiState {
    let config = fake_config(extra);
    let store: Arc<dyn InsightStore> = Arc::new(InMemoryInsightStore::new());

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        Arc::new(fetcher),
        Arc::new(EchoModel::new()),
        Arc::new(FixedSearch),
        Arc::new(RecordingIngestor::default()),
        Arc::clone(&store),
    ));

    ApiState {
        config,
        orchestrator,
        services: Arc::new(fake_services("150")),
        store,
    }
}
