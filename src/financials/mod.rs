//! Financial statement handling

mod accumulator;

pub use accumulator::{
    extract_line_items, strip_artifact_indices, truncate_at_sentinel, StatementAccumulator,
    STATEMENT_SENTINEL,
};

/// `"The balance sheet for <ticker> is <pairs>"` from a raw vendor dump
pub fn balance_sheet_text(ticker: &str, dump: &str) -> String {
    let accumulated = StatementAccumulator::from_dump(dump);
    let text = format!("The balance sheet for {} is {}", ticker, accumulated.render());
    text.replace('\n', ", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_sheet_text() {
        let dump = "{map[balance_sheet:map[assets:{Assets 100 USD 1.5e3} \
            equity_attributable_to_noncontrolling_interest:{Equity 1500 USD 0e0}]]}";
        assert_eq!(
            balance_sheet_text("AAPL", dump),
            "The balance sheet for AAPL is \"Assets\": \"$1,500.00\""
        );
    }

    #[test]
    fn test_balance_sheet_without_marker_keeps_every_account() {
        let text = balance_sheet_text(
            "KO",
            "{map[balance_sheet:map[assets:{Assets 100 USD 1.5e3} liabilities:{Liabilities 600 USD 2e2}]]}",
        );

        assert!(text.starts_with("The balance sheet for KO is "));
        assert!(text.contains("\"Assets\": \"$1,500.00\""));
        assert!(text.contains("\"Liabilities\": \"$200.00\""));
    }
}
