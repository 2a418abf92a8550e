//! Market-data and headline clients against a mock vendor

use chrono::NaiveDate;
use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use ticker_digest::error::AggregatorError;
use ticker_digest::prices::{CalendarDate, PriceLookupEngine};
use ticker_digest::providers::{
    HttpNewsSource, Indicator, MarketDataProvider, NewsSource, PolygonClient, PriceProvider,
};
use ticker_digest::services::CategoryServices;

const API_KEY: &str = "test-key";

fn client(server: &MockServer) -> PolygonClient {
    PolygonClient::new(API_KEY, server.base_url(), Duration::from_secs(5)).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_previous_close() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/aggs/ticker/AAPL/prev")
                .query_param("apiKey", API_KEY);
            then.status(200).json_body(json!({
                "ticker": "AAPL",
                "results": [{"o": 170.0, "c": 172.5, "t": 1709769600000_i64}]
            }));
        })
        .await;

    let sample = client(&server).previous_close("AAPL").await.unwrap();

    mock.assert_async().await;
    assert_eq!(sample.date, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
    assert_eq!(sample.close, dec("172.5"));
    assert_eq!(sample.open, dec("170"));
}

#[tokio::test]
async fn test_previous_close_server_error_is_upstream_unavailable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/aggs/ticker/AAPL/prev");
            then.status(502);
        })
        .await;

    let engine = PriceLookupEngine::new(Arc::new(client(&server)));
    let err = engine.previous_close("AAPL").await.unwrap_err();
    assert!(matches!(err, AggregatorError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn test_backward_search_is_bounded_to_eight_calls() {
    let server = MockServer::start_async().await;

    let mut mocks = Vec::new();
    for day in 13..=20 {
        let path = format!("/v1/open-close/AAPL/2023-03-{:02}", day);
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path(path.as_str());
                then.status(404).json_body(json!({"status": "NOT_FOUND"}));
            })
            .await;
        mocks.push(mock);
    }

    let engine = PriceLookupEngine::new(Arc::new(client(&server)));
    let sample = engine
        .closing_price_near("AAPL", CalendarDate::new(2023, 3, 20))
        .await
        .unwrap();

    for mock in &mocks {
        mock.assert_async().await;
    }
    assert!(!sample.is_available());
    assert_eq!(sample.date, NaiveDate::from_ymd_opt(2023, 3, 13).unwrap());
}

#[tokio::test]
async fn test_backward_search_stops_at_first_trading_day() {
    let server = MockServer::start_async().await;

    let weekend: Vec<_> = {
        let mut mocks = Vec::new();
        for day in ["2023-03-19", "2023-03-18"] {
            let path = format!("/v1/open-close/AAPL/{}", day);
            mocks.push(
                server
                    .mock_async(|when, then| {
                        when.method(GET).path(path.as_str());
                        then.status(404);
                    })
                    .await,
            );
        }
        mocks
    };
    let friday = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/open-close/AAPL/2023-03-17")
                .query_param("adjusted", "true");
            then.status(200).json_body(json!({
                "status": "OK",
                "from": "2023-03-17",
                "open": 155.8,
                "close": 155.0
            }));
        })
        .await;

    let engine = PriceLookupEngine::new(Arc::new(client(&server)));
    let sample = engine
        .closing_price_near("AAPL", CalendarDate::new(2023, 3, 19))
        .await
        .unwrap();

    for mock in &weekend {
        mock.assert_async().await;
    }
    friday.assert_async().await;
    assert_eq!(sample.open, dec("155.8"));
    assert_eq!(sample.date, NaiveDate::from_ymd_opt(2023, 3, 17).unwrap());
}

#[tokio::test]
async fn test_financials_dump_feeds_balance_sheet_text() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/vX/reference/financials")
                .query_param("ticker", "AAPL")
                .query_param("limit", "10");
            then.status(200).json_body(json!({
                "results": [{
                    "financials": {
                        "balance_sheet": {
                            "assets": {"label": "Assets", "order": 100, "unit": "USD", "value": 2500000.0}
                        }
                    }
                }, {
                    "financials": {
                        "balance_sheet": {
                            "assets": {"label": "Assets", "order": 100, "unit": "USD", "value": 500000.0},
                            "equity_attributable_to_noncontrolling_interest": {
                                "label": "Equity Attributable To Noncontrolling Interest",
                                "order": 1500, "unit": "USD", "value": 0.0
                            }
                        }
                    }
                }]
            }));
        })
        .await;

    let polygon = Arc::new(client(&server));
    let dump = polygon.financials_dump("AAPL").await.unwrap();
    assert!(dump.starts_with("{map[balance_sheet:map[assets:{Assets 100 USD "));

    let text = ticker_digest::financials::balance_sheet_text("AAPL", &dump);
    assert_eq!(text, "The balance sheet for AAPL is \"Assets\": \"$3,000,000.00\"");
}

#[tokio::test]
async fn test_missing_indicator_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/indicators/macd/AAPL")
                .query_param("short_window", "12")
                .query_param("long_window", "26")
                .query_param("signal_window", "9");
            then.status(200).json_body(json!({
                "results": {"values": [{"timestamp": 1, "value": 1.25, "signal": 0.5, "histogram": 0.75}]}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/indicators/rsi/AAPL");
            then.status(200).json_body(json!({"results": {"values": []}}));
        })
        .await;

    let polygon = client(&server);
    let macd = polygon.indicator("AAPL", Indicator::MACD).await.unwrap().unwrap();
    assert_eq!(macd.value, dec("1.25"));
    assert_eq!(macd.histogram, Some(dec("0.75")));

    assert!(polygon.indicator("AAPL", Indicator::RSI).await.unwrap().is_none());
}

#[tokio::test]
async fn test_news_category_through_headline_search() {
    let server = MockServer::start_async().await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET).path("/news").query_param("q", "BTC-news-crypto");
            then.status(200).json_body(json!({
                "results": (0..9)
                    .map(|i| json!({"title": format!("Headline {}", i), "link": "https://example.com"}))
                    .collect::<Vec<_>>()
            }));
        })
        .await;

    let polygon = Arc::new(client(&server));
    let news = Arc::new(HttpNewsSource::new(server.url("/news"), Duration::from_secs(5)).unwrap());
    let services = CategoryServices::new(polygon.clone(), polygon, news.clone());

    let text = services.news("X:BTCUSD").await.unwrap();
    search.assert_async().await;
    assert_eq!(
        text,
        "Headline 0. Headline 1. Headline 2. Headline 3. Headline 4. Headline 5"
    );

    assert_eq!(news.headlines("BTC-news-crypto", 2).await.unwrap().len(), 2);
}
