//! Statement accumulation
//!
//! The vendor's financial statements arrive as one concatenated text dump of
//! `key:{<Label> <order> USD <value>}` fragments. Everything after the
//! noncontrolling-interest field is ignored (vendor field order, not a schema);
//! a dump without that field is accumulated whole. The order index in front of the unit is discarded, and the remaining
//! values are summed per account label.

use crate::models::AccumulatedAccount;
use crate::numbers::{format_currency, parse_decimal};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Literal marker the dump is truncated at
pub const STATEMENT_SENTINEL: &str = "equity_attributable_to_noncontrolling_interest";

fn artifact_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+USD").expect("artifact pattern compiles"))
}

fn line_item_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z\s]+)\s+USD\s+([0-9eE+\-.]+)\s*\}")
            .expect("line item pattern compiles")
    })
}

/// Cut the dump just before the sentinel marker, or keep all of it when the marker is absent
pub fn truncate_at_sentinel(dump: &str) -> &str {
    match dump.find(STATEMENT_SENTINEL) {
        Some(idx) => &dump[..idx],
        None => {
            warn!(
                marker = STATEMENT_SENTINEL,
                "Could not properly collect financial statements, accumulating the whole dump"
            );
            dump
        }
    }
}

/// `"<digits> USD"` → `"USD"`; the digits are an ordering index, not a value
pub fn strip_artifact_indices(text: &str) -> String {
    artifact_pattern().replace_all(text, "USD").into_owned()
}

/// Pull every `(account, value token)` pair out of cleaned statement text
pub fn extract_line_items(text: &str) -> Vec<(String, String)> {
    line_item_pattern()
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Sums line items per account label.
///
/// Labels are matched byte-for-byte: `"Assets"` and `" Assets"` are separate
/// accounts. Map iteration order is unspecified and callers must not rely on it.
#[derive(Debug, Default, Clone)]
pub struct StatementAccumulator {
    totals: HashMap<String, Decimal>,
    dropped: usize,
}

impl StatementAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncate, clean, extract and sum a raw statement dump in one pass
    pub fn from_dump(dump: &str) -> Self {
        let truncated = truncate_at_sentinel(dump);
        let cleaned = strip_artifact_indices(truncated);

        let mut acc = Self::new();
        for (account, token) in extract_line_items(&cleaned) {
            acc.add(&account, &token);
        }

        debug!(
            accounts = acc.totals.len(),
            dropped = acc.dropped,
            "Accumulated statement line items"
        );

        acc
    }

    /// Add one value token to an account; unparseable tokens are dropped and logged
    pub fn add(&mut self, account: &str, token: &str) {
        match parse_decimal(token) {
            Ok(value) => {
                let total = self.totals.entry(account.to_string()).or_insert(Decimal::ZERO);
                match total.checked_add(value) {
                    Some(sum) => *total = sum,
                    None => {
                        warn!(account = %account, token = %token, "Line item overflows account total, dropped");
                        self.dropped += 1;
                    }
                }
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Unparseable line item dropped");
                self.dropped += 1;
            }
        }
    }

    pub fn total(&self, account: &str) -> Option<Decimal> {
        self.totals.get(account).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Number of line items skipped because their value could not be parsed
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn accounts(&self) -> Vec<AccumulatedAccount> {
        self.totals
            .iter()
            .map(|(name, total)| AccumulatedAccount {
                name: name.clone(),
                total: *total,
            })
            .collect()
    }

    /// `"Account": "$1,234.00", "Other": "$5.00"` in map iteration order
    pub fn render(&self) -> String {
        self.accounts()
            .iter()
            .map(|account| format!("\"{}\": \"{}\"", account.name, format_currency(account.total)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
