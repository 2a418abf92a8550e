//! External data collaborators
//!
//! Every outbound data source sits behind a trait so the pipeline can be
//! driven by in-process fakes in tests:
//! - `PriceProvider` / `MarketDataProvider`: the market-data vendor
//! - `NewsSource`: headline search
//! - `AnnotationSearch`: keyword/document search used to enrich prompts

pub mod news;
pub mod polygon;
pub mod search;

use crate::models::PriceSample;
use crate::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

pub use news::HttpNewsSource;
pub use polygon::PolygonClient;
pub use search::HttpAnnotationSearch;

/// Historical and most-recent prices
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    /// Most recent completed session
    async fn previous_close(&self, ticker: &str) -> Result<PriceSample>;

    /// Daily bar for an exact date; a missing bar is `Ok` with a zero open
    async fn daily_open_close(&self, ticker: &str, date: NaiveDate) -> Result<PriceSample>;
}

/// Technical indicators the `ta` category reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Macd { short: u32, long: u32, signal: u32 },
    Sma { window: u32 },
    Ema { window: u32 },
    Rsi { window: u32 },
}

impl Indicator {
    pub const MACD: Indicator = Indicator::Macd {
        short: 12,
        long: 26,
        signal: 9,
    };
    pub const SMA: Indicator = Indicator::Sma { window: 50 };
    pub const EMA: Indicator = Indicator::Ema { window: 50 };
    pub const RSI: Indicator = Indicator::Rsi { window: 14 };

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Macd { .. } => "MACD",
            Indicator::Sma { .. } => "SMA",
            Indicator::Ema { .. } => "EMA",
            Indicator::Rsi { .. } => "RSI",
        }
    }

    /// Vendor path segment
    pub fn slug(&self) -> &'static str {
        match self {
            Indicator::Macd { .. } => "macd",
            Indicator::Sma { .. } => "sma",
            Indicator::Ema { .. } => "ema",
            Indicator::Rsi { .. } => "rsi",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Latest value of an indicator; MACD also carries signal and histogram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorReading {
    pub value: Decimal,
    pub signal: Option<Decimal>,
    pub histogram: Option<Decimal>,
}

/// Full market-data vendor surface
#[async_trait::async_trait]
pub trait MarketDataProvider: PriceProvider {
    /// Financial statements as the vendor's concatenated `key:{Label order unit value}` text
    async fn financials_dump(&self, ticker: &str) -> Result<String>;

    async fn ticker_description(&self, ticker: &str) -> Result<String>;

    /// `Ok(None)` when the vendor has no values for this indicator
    async fn indicator(&self, ticker: &str, indicator: Indicator) -> Result<Option<IndicatorReading>>;
}

/// Headline search
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Snippet search used to annotate narration prompts
#[async_trait::async_trait]
pub trait AnnotationSearch: Send + Sync {
    async fn annotate(&self, query: &str) -> Result<String>;
}

/// Search disabled: every annotation is empty
pub struct NoAnnotations;

#[async_trait::async_trait]
impl AnnotationSearch for NoAnnotations {
    async fn annotate(&self, _query: &str) -> Result<String> {
        Ok(String::new())
    }
}
