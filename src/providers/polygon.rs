//! Polygon-style market-data REST client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{Indicator, IndicatorReading, MarketDataProvider, PriceProvider};
use crate::error::AggregatorError;
use crate::models::PriceSample;
use crate::Result;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error};

pub struct PolygonClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PolygonClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GET a vendor path; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!("Market data request failed: {}", e);
                AggregatorError::UpstreamUnavailable(format!("market data request to {}: {}", path, e))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(path = %path, "Market data not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(path = %path, status = %status, "Market data error response: {}", body);
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "market data {} returned {}",
                path, status
            )));
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            AggregatorError::UpstreamUnavailable(format!("market data {} parse error: {}", path, e))
        })?;

        Ok(Some(parsed))
    }
}

// =============================
// Vendor response shapes
// =============================

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "t")]
    timestamp_ms: i64,
}

#[derive(Debug, Deserialize)]
struct OpenCloseResponse {
    #[serde(default)]
    open: f64,
    #[serde(default)]
    close: f64,
}

#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialFiling>,
}

#[derive(Debug, Deserialize)]
struct FinancialFiling {
    #[serde(default)]
    financials: BTreeMap<String, BTreeMap<String, FinancialItem>>,
}

#[derive(Debug, Deserialize)]
struct FinancialItem {
    #[serde(default)]
    label: String,
    #[serde(default)]
    order: i64,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: Option<TickerDetails>,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndicatorResponse {
    results: Option<IndicatorResults>,
}

#[derive(Debug, Deserialize)]
struct IndicatorResults {
    #[serde(default)]
    values: Vec<IndicatorValue>,
}

#[derive(Debug, Deserialize)]
struct IndicatorValue {
    value: f64,
    signal: Option<f64>,
    histogram: Option<f64>,
}

fn to_decimal(value: f64) -> Result<Decimal> {
    Decimal::try_from(value)
        .map_err(|e| AggregatorError::ParseFailure(format!("price {} not representable: {}", value, e)))
}

/// Render filings as `map[section:map[key:{Label order unit value} ...] ...]`, keys sorted
fn render_filings(filings: &[FinancialFiling]) -> String {
    filings
        .iter()
        .map(|filing| {
            let sections: Vec<String> = filing
                .financials
                .iter()
                .map(|(section, items)| {
                    let rendered: Vec<String> = items
                        .iter()
                        .map(|(key, item)| {
                            format!(
                                "{}:{{{} {} {} {:e}}}",
                                key, item.label, item.order, item.unit, item.value
                            )
                        })
                        .collect();
                    format!("{}:map[{}]", section, rendered.join(" "))
                })
                .collect();
            format!("{{map[{}]}}", sections.join(" "))
        })
        .collect()
}

#[async_trait::async_trait]
impl PriceProvider for PolygonClient {
    async fn previous_close(&self, ticker: &str) -> Result<PriceSample> {
        let path = format!("/v2/aggs/ticker/{}/prev", ticker);
        let response: Option<AggregatesResponse> = self
            .get_json(&path, &[("adjusted", "true".to_string())])
            .await?;

        let bar = response
            .and_then(|r| r.results.into_iter().next())
            .ok_or_else(|| {
                AggregatorError::UpstreamUnavailable(format!("no previous close for {}", ticker))
            })?;

        let date = DateTime::from_timestamp_millis(bar.timestamp_ms)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                AggregatorError::ParseFailure(format!("bad bar timestamp {}", bar.timestamp_ms))
            })?;

        Ok(PriceSample {
            date,
            open: to_decimal(bar.open)?,
            close: to_decimal(bar.close)?,
        })
    }

    async fn daily_open_close(&self, ticker: &str, date: NaiveDate) -> Result<PriceSample> {
        let path = format!("/v1/open-close/{}/{}", ticker, date.format("%Y-%m-%d"));
        let response: Option<OpenCloseResponse> = self
            .get_json(&path, &[("adjusted", "true".to_string())])
            .await?;

        match response {
            Some(bar) => Ok(PriceSample {
                date,
                open: to_decimal(bar.open)?,
                close: to_decimal(bar.close)?,
            }),
            None => Ok(PriceSample::empty(date)),
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for PolygonClient {
    async fn financials_dump(&self, ticker: &str) -> Result<String> {
        let response: Option<FinancialsResponse> = self
            .get_json(
                "/vX/reference/financials",
                &[("ticker", ticker.to_string()), ("limit", "10".to_string())],
            )
            .await?;

        let filings = response.map(|r| r.results).unwrap_or_default();
        if filings.is_empty() {
            return Err(AggregatorError::UpstreamUnavailable(format!(
                "no financial statements for {}",
                ticker
            )));
        }

        Ok(render_filings(&filings))
    }

    async fn ticker_description(&self, ticker: &str) -> Result<String> {
        let path = format!("/v3/reference/tickers/{}", ticker);
        let year_start = format!("{}-01-01", chrono::Utc::now().format("%Y"));
        let response: Option<TickerDetailsResponse> =
            self.get_json(&path, &[("date", year_start)]).await?;

        response
            .and_then(|r| r.results)
            .and_then(|d| d.description)
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                AggregatorError::UpstreamUnavailable(format!("no description for {}", ticker))
            })
    }

    async fn indicator(&self, ticker: &str, indicator: Indicator) -> Result<Option<IndicatorReading>> {
        let path = format!("/v1/indicators/{}/{}", indicator.slug(), ticker);

        let mut query = vec![
            ("timespan", "day".to_string()),
            ("series_type", "close".to_string()),
            ("order", "desc".to_string()),
            ("limit", "1".to_string()),
        ];
        match indicator {
            Indicator::Macd { short, long, signal } => {
                query.push(("short_window", short.to_string()));
                query.push(("long_window", long.to_string()));
                query.push(("signal_window", signal.to_string()));
            }
            Indicator::Sma { window } | Indicator::Ema { window } | Indicator::Rsi { window } => {
                query.push(("window", window.to_string()));
            }
        }

        let response: Option<IndicatorResponse> = self.get_json(&path, &query).await?;

        let Some(latest) = response
            .and_then(|r| r.results)
            .and_then(|r| r.values.into_iter().next())
        else {
            return Ok(None);
        };

        Ok(Some(IndicatorReading {
            value: to_decimal(latest.value)?,
            signal: latest.signal.map(to_decimal).transpose()?,
            histogram: latest.histogram.map(to_decimal).transpose()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financials::StatementAccumulator;

    #[test]
    fn test_render_filings_feeds_the_accumulator() {
        let body = serde_json::json!({
            "results": [{
                "financials": {
                    "balance_sheet": {
                        "assets": {"label": "Assets", "order": 100, "unit": "USD", "value": 352583000000.0},
                        "equity": {"label": "Equity", "order": 1400, "unit": "USD", "value": 50672000000.0},
                        "equity_attributable_to_noncontrolling_interest": {"label": "Equity Attributable To Noncontrolling Interest", "order": 1500, "unit": "USD", "value": 0.0},
                        "liabilities": {"label": "Liabilities", "order": 600, "unit": "USD", "value": 290437000000.0}
                    }
                }
            }]
        });
        let parsed: FinancialsResponse = serde_json::from_value(body).unwrap();
        let dump = render_filings(&parsed.results);

        assert!(dump.starts_with("{map[balance_sheet:map[assets:{Assets 100 USD 3.52583e11}"));

        let acc = StatementAccumulator::from_dump(&dump);
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.total("Assets"), Some(Decimal::from(352_583_000_000u64)));
        assert_eq!(acc.total("Liabilities"), None);
    }

    #[test]
    fn test_indicator_params() {
        assert_eq!(Indicator::MACD.slug(), "macd");
        assert_eq!(Indicator::RSI, Indicator::Rsi { window: 14 });
        assert_eq!(Indicator::SMA.to_string(), "SMA");
    }
}
