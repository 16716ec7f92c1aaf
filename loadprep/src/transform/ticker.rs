//! Ticker symbol checks and normalization.
//!
//! Two separate policies live here: a read-only format audit
//! ([`validate_ticker_format`]) and a cleaning pass that canonicalizes
//! `stk` tickers and drops everything else ([`clean_tickers`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{TableError, TableResult};
use crate::logs::PipelineLog;
use crate::models::{Column, DataType, Table, Value};

static FORMAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{3}\d{3}$").expect("ticker format pattern"));
static STK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^stk(\d{1,3})$").expect("stk ticker pattern"));

/// Summary of a ticker format audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerReport {
    pub column: String,
    /// One entry per row, true when the ticker is well formed
    pub mask: Vec<bool>,
    pub total: usize,
    pub valid: usize,
    pub valid_pct: f64,
    pub invalid: usize,
    pub invalid_pct: f64,
    pub nulls: usize,
    /// Distinct invalid values in first-seen order
    pub invalid_values: Vec<Value>,
}

/// Inclusive range of accepted `stk` numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRange {
    pub min: u32,
    pub max: u32,
}

impl Default for TickerRange {
    fn default() -> Self {
        Self { min: 1, max: 500 }
    }
}

impl TickerRange {
    pub fn contains(&self, n: u32) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

/// Output of [`clean_tickers`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTickers {
    pub table: Table,
    pub dropped: usize,
}

/// True when `value` is a string of three lower-case letters and three digits.
pub fn is_valid_ticker(value: &Value) -> bool {
    value.as_str().is_some_and(|s| FORMAT_RE.is_match(s))
}

/// Canonical form of a raw `stk` ticker, `None` when it is rejected.
///
/// `" STK7 "` becomes `"stk007"`; numbers outside `range` are rejected.
pub fn normalize_ticker(raw: &str, range: TickerRange) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let caps = STK_RE.captures(&lowered)?;
    let number: u32 = caps.get(1)?.as_str().parse().ok()?;
    range.contains(number).then(|| format!("stk{:03}", number))
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Audit `column` against the ticker format without touching the table.
pub fn validate_ticker_format(table: &Table, column: &str, log: &dyn PipelineLog) -> TableResult<TickerReport> {
    let source = table.column(column, "ticker validation")?;

    let mask: Vec<bool> = source.values.iter().map(is_valid_ticker).collect();
    let total = mask.len();
    let valid = mask.iter().filter(|ok| **ok).count();
    let invalid = total - valid;

    let mut seen = HashSet::new();
    let invalid_values: Vec<Value> = source
        .values
        .iter()
        .zip(&mask)
        .filter(|(_, ok)| !**ok)
        .filter(|(v, _)| seen.insert(v.key()))
        .map(|(v, _)| v.clone())
        .collect();

    let report = TickerReport {
        column: column.to_string(),
        total,
        valid,
        valid_pct: percent(valid, total),
        invalid,
        invalid_pct: percent(invalid, total),
        nulls: source.null_count(),
        invalid_values,
        mask,
    };

    log.info(&format!("Total rows: {}", report.total));
    log.info(&format!("Valid format: {} ({:.1}%)", report.valid, report.valid_pct));
    log.info(&format!("Invalid format: {} ({:.1}%)", report.invalid, report.invalid_pct));
    log.info(&format!("Null values: {}", report.nulls));
    if report.invalid > 0 {
        log.warning(&format!(
            "Invalid ticker symbols (unique values): {}",
            report.invalid_values.len()
        ));
        for value in &report.invalid_values {
            let shown = if value.is_null() { "<null>".to_string() } else { value.to_string() };
            log.info_indent(&format!("- {}", shown), 1);
        }
    }

    Ok(report)
}

/// Canonicalize `stk` tickers in `column` and drop every other row.
pub fn clean_tickers(
    table: &Table,
    column: &str,
    range: TickerRange,
    log: &dyn PipelineLog,
) -> TableResult<CleanedTickers> {
    if range.min > range.max {
        return Err(TableError::InvalidInput(format!(
            "ticker range {}..={} is empty",
            range.min, range.max
        )));
    }
    let source = table.column(column, "ticker cleaning")?;
    log.info(&format!("Cleaning tickers in {}...", column));

    let normalized: Vec<Option<String>> = source
        .values
        .iter()
        .map(|v| v.as_str().and_then(|s| normalize_ticker(s, range)))
        .collect();
    let keep: Vec<bool> = normalized.iter().map(Option::is_some).collect();
    let values = normalized
        .into_iter()
        .map(|t| t.map(Value::Str).unwrap_or(Value::Null))
        .collect();

    let mut working = table.clone();
    working.replace_column(Column::new(column, DataType::Utf8, values))?;
    let out = working.filter(&keep);
    let dropped = table.row_count() - out.row_count();

    log.info(&format!("{} rows with invalid tickers dropped.", dropped));
    Ok(CleanedTickers { table: out, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogLevel, MemoryLog};
    use pretty_assertions::assert_eq;

    fn single(values: Vec<Value>) -> Table {
        Table::new(vec![Column::infer("ticker_symbol", values)]).unwrap()
    }

    #[test]
    fn test_patterns_compile() {
        assert!(FORMAT_RE.is_match("abc123"));
        assert!(STK_RE.is_match("stk7"));
    }

    #[test]
    fn test_clean_example() {
        let table = single(vec![
            Value::str("STK7"),
            Value::str("stk501"),
            Value::str("stk12"),
            Value::str("bad"),
        ]);
        let cleaned = clean_tickers(&table, "ticker_symbol", TickerRange::default(), &MemoryLog::new()).unwrap();

        assert_eq!(
            cleaned.table.column("ticker_symbol", "t").unwrap().values,
            vec![Value::str("stk007"), Value::str("stk012")]
        );
        assert_eq!(cleaned.dropped, 2);
    }

    #[test]
    fn test_clean_drops_nulls_and_trims() {
        let table = Table::from_rows(
            &["ticker", "n"],
            vec![
                vec![Value::str("  stk500 "), Value::Int(1)],
                vec![Value::Null, Value::Int(2)],
                vec![Value::str("stk000"), Value::Int(3)],
            ],
        )
        .unwrap();
        let cleaned = clean_tickers(&table, "ticker", TickerRange::default(), &MemoryLog::new()).unwrap();
        assert_eq!(cleaned.table.row_count(), 1);
        assert_eq!(cleaned.table.row(0), vec![&Value::str("stk500"), &Value::Int(1)]);
    }

    #[test]
    fn test_clean_custom_range() {
        let range = TickerRange { min: 10, max: 20 };
        assert_eq!(normalize_ticker("stk9", range), None);
        assert_eq!(normalize_ticker("Stk15", range), Some("stk015".to_string()));
        assert_eq!(normalize_ticker("stk1234", TickerRange::default()), None);
    }

    #[test]
    fn test_clean_rejects_empty_range() {
        let table = single(vec![Value::str("stk1")]);
        let err = clean_tickers(&table, "ticker_symbol", TickerRange { min: 5, max: 1 }, &MemoryLog::new())
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_example() {
        let table = single(vec![Value::str("abc123"), Value::str("AB1234"), Value::Null]);
        let log = MemoryLog::new();
        let report = validate_ticker_format(&table, "ticker_symbol", &log).unwrap();

        assert_eq!(report.mask, vec![true, false, false]);
        assert_eq!(report.total, 3);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 2);
        assert_eq!(report.nulls, 1);
        assert_eq!(report.invalid_values, vec![Value::str("AB1234"), Value::Null]);
        assert!(log.contains(LogLevel::Info, "Valid format: 1 (33.3%)"));
        assert!(log.contains(LogLevel::Warning, "unique values): 2"));
    }

    #[test]
    fn test_validate_does_not_mutate() {
        let table = single(vec![Value::str("XYZ999")]);
        let before = table.clone();
        let report = validate_ticker_format(&table, "ticker_symbol", &MemoryLog::new()).unwrap();
        assert_eq!(table, before);
        assert_eq!(report.mask, vec![false]);
    }

    #[test]
    fn test_validate_empty_table() {
        let table = single(vec![]);
        let report = validate_ticker_format(&table, "ticker_symbol", &MemoryLog::new()).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.valid_pct, 0.0);
        assert_eq!(report.invalid_pct, 0.0);
    }

    #[test]
    fn test_missing_column() {
        let table = single(vec![Value::str("abc123")]);
        let err = validate_ticker_format(&table, "ticker", &MemoryLog::new()).unwrap_err();
        assert!(matches!(err, TableError::Schema { .. }));
    }
}
