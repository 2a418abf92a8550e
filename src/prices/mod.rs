//! Price lookup engine
//!
//! Resolves the most recent close and the nearest trading-day price on or
//! before a calendar date, stepping back one day at a time when the provider
//! has no bar for the requested date.

use crate::error::AggregatorError;
use crate::models::PriceSample;
use crate::numbers::round_half_up;
use crate::providers::PriceProvider;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Retries after the first attempt; the provider is called at most `MAX_RETRIES + 1` times
pub const MAX_RETRIES: usize = 7;

/// Loose (year, month, day) triple used for the backward search.
///
/// Stepping back from day 1 lands on day 31 of the previous month regardless
/// of that month's length; [`CalendarDate::to_naive`] clamps such days to the
/// month's last day, so a short month repeats its final date. This is an
/// approximation, not end-of-month arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

impl CalendarDate {
    /// Month is clamped to `1..=12` and day to `1..=31`
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: month.clamp(1, 12),
            day: day.clamp(1, 31),
        }
    }

    /// Same month and day, one year earlier
    pub fn year_before(date: NaiveDate) -> Self {
        Self::new(date.year() - 1, date.month(), date.day())
    }

    pub fn step_back(self) -> Self {
        let Self { year, month, day } = self;

        if day > 1 {
            Self::new(year, month, day - 1)
        } else if month > 1 {
            Self::new(year, month - 1, 31)
        } else {
            Self::new(year - 1, 12, 31)
        }
    }

    /// Calendar date with the day clamped to the month's length
    pub fn to_naive(&self) -> Option<NaiveDate> {
        let last = last_day_of_month(self.year, self.month)?;
        NaiveDate::from_ymd_opt(self.year, self.month, self.day.min(last))
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|date| date.day())
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month(), date.day())
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// `round(((recent - year_ago) / year_ago) * 100, 2)`, half away from zero
pub fn percent_change(recent: Decimal, year_ago: Decimal) -> Result<Decimal> {
    let ratio = (recent - year_ago).checked_div(year_ago).ok_or_else(|| {
        AggregatorError::DivisionByZero(format!(
            "year-ago price is {} for a recent price of {}",
            year_ago, recent
        ))
    })?;

    Ok(round_half_up(ratio * Decimal::ONE_HUNDRED, 2))
}

/// Recent close against the year-ago open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearOverYear {
    pub recent: PriceSample,
    pub year_ago: PriceSample,
    /// `None` when the year-ago price is zero
    pub percent_change: Option<Decimal>,
}

pub struct PriceLookupEngine {
    provider: Arc<dyn PriceProvider>,
}

impl PriceLookupEngine {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        Self { provider }
    }

    /// Single provider call, no retry
    pub async fn previous_close(&self, ticker: &str) -> Result<PriceSample> {
        self.provider
            .previous_close(ticker)
            .await
            .map_err(|e| match e {
                AggregatorError::UpstreamUnavailable(_) => e,
                other => AggregatorError::UpstreamUnavailable(other.to_string()),
            })
    }

    /// Nearest available bar on or before `target`.
    ///
    /// After [`MAX_RETRIES`] step-backs the last sample is returned even if it
    /// is zero-valued; callers must check [`PriceSample::is_available`].
    /// `NotFound` only when every attempt failed outright.
    pub async fn closing_price_near(&self, ticker: &str, target: CalendarDate) -> Result<PriceSample> {
        let mut date = target;
        let mut last: Option<PriceSample> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                date = date.step_back();
            }

            let Some(naive) = date.to_naive() else {
                warn!(ticker = %ticker, date = %date, "Calendar date out of range, stopping search");
                break;
            };

            match self.provider.daily_open_close(ticker, naive).await {
                Ok(sample) if sample.is_available() => {
                    debug!(ticker = %ticker, date = %naive, attempt, "Found trading day");
                    return Ok(sample);
                }
                Ok(sample) => {
                    debug!(ticker = %ticker, date = %naive, attempt, "No bar for date");
                    last = Some(sample);
                }
                Err(e) => {
                    warn!(ticker = %ticker, date = %naive, attempt, "Daily bar request failed: {}", e);
                }
            }
        }

        last.ok_or_else(|| AggregatorError::NotFound {
            ticker: ticker.to_string(),
            date: target.to_string(),
        })
    }

    /// Previous close vs. the price one year before `today`
    pub async fn year_over_year(&self, ticker: &str, today: NaiveDate) -> Result<YearOverYear> {
        let recent = self.previous_close(ticker).await?;
        let year_ago = self
            .closing_price_near(ticker, CalendarDate::year_before(today))
            .await?;

        let percent_change = match percent_change(recent.close, year_ago.open) {
            Ok(pct) => Some(pct),
            Err(e) => {
                warn!(ticker = %ticker, "Percent change unavailable: {}", e);
                None
            }
        };

        Ok(YearOverYear {
            recent,
            year_ago,
            percent_change,
        })
    }
}
