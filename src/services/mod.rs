//! Category sub-services
//!
//! Each category turns vendor data into one line of raw text. The text returned
//! here carries no timestamp; the HTTP layer appends one after the raw document
//! has been deduplicated.

use crate::error::AggregatorError;
use crate::financials::balance_sheet_text;
use crate::models::Category;
use crate::prices::PriceLookupEngine;
use crate::providers::{Indicator, IndicatorReading, MarketDataProvider, NewsSource, PriceProvider};
use crate::Result;
use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Headlines kept for the news category
pub const MAX_HEADLINES: usize = 6;

/// `X:BTCUSD` → (`BTC`, `-crypto`); anything else → (ticker, `-stock`)
pub fn strip_asset_prefix(ticker: &str) -> (&str, &'static str) {
    match ticker.strip_prefix("X:") {
        Some(pair) => (pair.strip_suffix("USD").unwrap_or(pair), "-crypto"),
        None => (ticker, "-stock"),
    }
}

/// Crypto (`X:`) and index (`I:`) tickers
pub fn is_prefixed_asset(ticker: &str) -> bool {
    ticker.starts_with("X:") || ticker.starts_with("I:")
}

/// Append the served-at stamp, `MM-DD-YYYY HH:MM:SS` local time
pub fn with_timestamp(text: &str) -> String {
    format!(
        "{}, as of date and time {}",
        text,
        Local::now().format("%m-%d-%Y %H:%M:%S")
    )
}

fn render_indicator(indicator: Indicator, reading: Option<IndicatorReading>) -> String {
    let name = indicator.name();
    match (indicator, reading) {
        (Indicator::Macd { .. }, Some(r)) => format!(
            "{}: MACD Value: {:.6} Signal: {:.6} Histogram: {:.6}",
            name,
            r.value,
            r.signal.unwrap_or_default(),
            r.histogram.unwrap_or_default()
        ),
        (_, Some(r)) => format!("{}: {} Value: {:.6}", name, name, r.value),
        (_, None) => format!("{}: Data not available", name),
    }
}

pub struct CategoryServices {
    market: Arc<dyn MarketDataProvider>,
    prices: PriceLookupEngine,
    news: Arc<dyn NewsSource>,
}

impl CategoryServices {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        prices: Arc<dyn PriceProvider>,
        news: Arc<dyn NewsSource>,
    ) -> Self {
        Self {
            market,
            prices: PriceLookupEngine::new(prices),
            news,
        }
    }

    pub async fn render(&self, category: Category, ticker: &str) -> Result<String> {
        if ticker.trim().is_empty() {
            return Err(AggregatorError::MissingParameter("ticker".to_string()));
        }

        match category {
            Category::Price => self.stock_performance(ticker).await,
            Category::Financials => self.financials(ticker).await,
            Category::News => self.news(ticker).await,
            Category::Description => self.description(ticker).await,
            Category::TechnicalAnalysis => self.technical_analysis(ticker).await,
        }
    }

    pub async fn stock_performance(&self, ticker: &str) -> Result<String> {
        self.stock_performance_on(ticker, Utc::now().date_naive()).await
    }

    pub async fn stock_performance_on(&self, ticker: &str, today: NaiveDate) -> Result<String> {
        let yoy = self.prices.year_over_year(ticker, today).await?;
        let (display, _) = strip_asset_prefix(ticker);

        let change = match yoy.percent_change {
            Some(pct) => format!("{}%", pct.normalize()),
            None => "unavailable".to_string(),
        };

        Ok(format!(
            "{} stock previously closed at ${}.The yearly stock percent change for {} is {}",
            display,
            yoy.recent.close.normalize(),
            ticker,
            change
        ))
    }

    pub async fn financials(&self, ticker: &str) -> Result<String> {
        let dump = self.market.financials_dump(ticker).await?;
        Ok(balance_sheet_text(ticker, &dump))
    }

    pub async fn news(&self, ticker: &str) -> Result<String> {
        let (base, tag) = strip_asset_prefix(ticker);
        let query = format!("{}-news{}", base.to_uppercase(), tag);

        let headlines = self.news.headlines(&query, MAX_HEADLINES).await?;
        if headlines.is_empty() {
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "no headlines for {}",
                ticker
            )));
        }

        debug!(ticker = %ticker, count = headlines.len(), "Collected news");
        Ok(headlines.join(". "))
    }

    pub async fn description(&self, ticker: &str) -> Result<String> {
        if is_prefixed_asset(ticker) {
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "no company description for {}",
                ticker
            )));
        }

        let text = self.market.ticker_description(ticker).await?;
        Ok(text.replace(['{', '}'], "").trim().to_string())
    }

    pub async fn technical_analysis(&self, ticker: &str) -> Result<String> {
        let stock_info = match self.stock_performance(ticker).await {
            Ok(text) => text,
            Err(e) => {
                warn!(ticker = %ticker, "Stock info unavailable for technical analysis: {}", e);
                "Data not available".to_string()
            }
        };

        let mut parts = vec![format!("Stock Info: {}", stock_info)];
        for indicator in [Indicator::MACD, Indicator::SMA, Indicator::EMA, Indicator::RSI] {
            let reading = match self.market.indicator(ticker, indicator).await {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(ticker = %ticker, indicator = %indicator, "Indicator request failed: {}", e);
                    None
                }
            };
            parts.push(render_indicator(indicator, reading));
        }

        Ok(parts.join(", "))
    }
}
