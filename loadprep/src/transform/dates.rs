//! Dropping rows dated in the future.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::error::TableResult;
use crate::logs::PipelineLog;
use crate::models::{Column, DataType, Table, Value};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a timestamp in any of the accepted text formats.
///
/// Offsets are converted to local wall-clock time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert a cell to a timestamp; anything unparseable becomes null.
pub fn to_timestamp(value: &Value) -> Value {
    match value {
        Value::Timestamp(t) => Value::Timestamp(*t),
        Value::Str(s) => parse_timestamp(s).map(Value::Timestamp).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Drop rows whose `column` lies after the current local time.
pub fn drop_future(table: &Table, column: &str, log: &dyn PipelineLog) -> TableResult<Table> {
    let now = Local::now().naive_local();
    drop_future_at(table, column, now, log)
}

/// Drop rows whose `column` lies strictly after `now`.
///
/// The column is converted to `Timestamp`. Values that cannot be parsed
/// become null and their rows are kept.
pub fn drop_future_at(
    table: &Table,
    column: &str,
    now: NaiveDateTime,
    log: &dyn PipelineLog,
) -> TableResult<Table> {
    log.info("Dropping future dates...");

    let source = table.column(column, "date filter input")?;
    let converted: Vec<Value> = source.values.iter().map(to_timestamp).collect();
    let unparsed = converted
        .iter()
        .zip(&source.values)
        .filter(|(after, before)| after.is_null() && !before.is_null())
        .count();

    let keep: Vec<bool> = converted
        .iter()
        .map(|v| match v {
            Value::Timestamp(t) => *t <= now,
            _ => true,
        })
        .collect();

    let mut working = table.clone();
    working.replace_column(Column::new(column, DataType::Timestamp, converted))?;
    let out = working.filter(&keep);

    if unparsed > 0 {
        log.warning(&format!("{} values in {} could not be read as dates.", unparsed, column));
    }
    log.info(&format!("{} future dates dropped.", table.row_count() - out.row_count()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableError;
    use crate::logs::MemoryLog;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_timestamp("2024-03-01"), Some(at(2024, 3, 1)));
        assert_eq!(parse_timestamp("2024/03/01"), Some(at(2024, 3, 1)));
        assert_eq!(parse_timestamp("03/01/2024"), Some(at(2024, 3, 1)));
        assert_eq!(parse_timestamp("01.03.2024"), Some(at(2024, 3, 1)));
        assert_eq!(
            parse_timestamp("2024-03-01 12:30:00"),
            at(2024, 3, 1).checked_add_signed(chrono::Duration::minutes(750))
        );
        assert!(parse_timestamp("2024-03-01T12:30:00.250").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_drops_only_future_rows() {
        let table = Table::from_rows(
            &["title", "released"],
            vec![
                vec![Value::str("old"), Value::str("2020-01-01")],
                vec![Value::str("today"), Value::str("2024-06-01")],
                vec![Value::str("future"), Value::str("2031-01-01")],
                vec![Value::str("garbage"), Value::str("soon")],
                vec![Value::str("missing"), Value::Null],
            ],
        )
        .unwrap();
        let log = MemoryLog::new();
        let out = drop_future_at(&table, "released", at(2024, 6, 1), &log).unwrap();

        let titles: Vec<String> = out
            .column("title", "t")
            .unwrap()
            .values
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(titles, vec!["old", "today", "garbage", "missing"]);

        let released = out.column("released", "t").unwrap();
        assert_eq!(released.dtype, DataType::Timestamp);
        assert!(released.values[2].is_null());
        assert!(log.messages().contains(&"1 future dates dropped.".to_string()));
    }

    #[test]
    fn test_input_table_untouched() {
        let table = Table::from_rows(&["d"], vec![vec![Value::str("2999-01-01")]]).unwrap();
        let out = drop_future_at(&table, "d", at(2024, 1, 1), &MemoryLog::new()).unwrap();
        assert_eq!(out.row_count(), 0);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column("d", "t").unwrap().dtype, DataType::Utf8);
    }

    #[test]
    fn test_missing_column() {
        let table = Table::from_rows(&["d"], vec![vec![Value::Null]]).unwrap();
        let err = drop_future(&table, "released", &MemoryLog::new()).unwrap_err();
        assert!(matches!(err, TableError::Schema { .. }));
    }
}
