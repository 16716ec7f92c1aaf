//! Final column order and types before loading.

use std::collections::BTreeMap;

use crate::error::{TableError, TableResult};
use crate::logs::PipelineLog;
use crate::models::{Column, DataType, Table, Value};

use super::dates::parse_timestamp;

/// Reproject `table` onto `columns` (in that order) and coerce the columns
/// named in `dtypes`.
///
/// Columns not listed in `dtypes` keep their type. Nulls survive every
/// coercion; any other value that cannot be converted fails the whole call.
pub fn arrange<S: AsRef<str>>(
    table: &Table,
    columns: &[S],
    dtypes: &BTreeMap<String, DataType>,
    log: &dyn PipelineLog,
) -> TableResult<Table> {
    let projected = table.select(columns, "column arrangement")?;
    if let Some(unknown) = dtypes.keys().find(|name| !projected.has_column(name)) {
        return Err(TableError::missing_column(unknown.clone(), "column arrangement"));
    }

    let coerced = projected
        .into_columns()
        .into_iter()
        .map(|col| match dtypes.get(&col.name) {
            Some(target) => coerce_column(col, *target),
            None => Ok(col),
        })
        .collect::<TableResult<Vec<_>>>()?;

    let out = Table::new(coerced)?;
    log.info(&format!(
        "Arranged {} columns, {} retyped.",
        out.column_count(),
        dtypes.len()
    ));
    Ok(out)
}

/// Convert every value of `column` to `target`.
///
/// A column already declared as `target` is still checked value by value.
pub fn coerce_column(column: Column, target: DataType) -> TableResult<Column> {
    if column.dtype == target && column.is_consistent() {
        return Ok(column);
    }
    let values = column
        .values
        .iter()
        .enumerate()
        .map(|(row, value)| {
            coerce_value(value, target).ok_or_else(|| TableError::TypeCoercion {
                column: column.name.clone(),
                row,
                value: value.to_string(),
                target,
            })
        })
        .collect::<TableResult<Vec<_>>>()?;
    Ok(Column::new(column.name, target, values))
}

/// Convert one value, `None` when it has no representation in `target`.
pub fn coerce_value(value: &Value, target: DataType) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    match target {
        DataType::Int64 => to_int(value).map(Value::Int),
        DataType::Float64 => to_float(value).map(Value::Float),
        DataType::Utf8 => Some(Value::Str(value.to_string())),
        DataType::Bool => to_bool(value).map(Value::Bool),
        DataType::Timestamp => match value {
            Value::Timestamp(t) => Some(Value::Timestamp(*t)),
            Value::Str(s) => parse_timestamp(s).map(Value::Timestamp),
            _ => None,
        },
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Str(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "t" | "y" => Some(true),
            "false" | "no" | "0" | "f" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::MemoryLog;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn raw() -> Table {
        Table::from_rows(
            &["name", "plays", "active", "since"],
            vec![
                vec![Value::str("a"), Value::str("10"), Value::str("yes"), Value::str("2020-01-02")],
                vec![Value::str("b"), Value::Null, Value::str("0"), Value::Null],
            ],
        )
        .unwrap()
    }

    fn dtypes(pairs: &[(&str, DataType)]) -> BTreeMap<String, DataType> {
        pairs.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn test_reorders_and_projects() {
        let out = arrange(&raw(), &["since", "name"], &BTreeMap::new(), &MemoryLog::new()).unwrap();
        assert_eq!(out.column_names(), vec!["since", "name"]);
        assert_eq!(out.column("since", "t").unwrap().dtype, DataType::Utf8);
    }

    #[test]
    fn test_coerces_listed_columns() {
        let types = dtypes(&[
            ("plays", DataType::Int64),
            ("active", DataType::Bool),
            ("since", DataType::Timestamp),
        ]);
        let out = arrange(&raw(), &["name", "plays", "active", "since"], &types, &MemoryLog::new()).unwrap();

        let plays = out.column("plays", "t").unwrap();
        assert_eq!(plays.dtype, DataType::Int64);
        assert_eq!(plays.values, vec![Value::Int(10), Value::Null]);
        assert_eq!(out.column("active", "t").unwrap().values, vec![Value::Bool(true), Value::Bool(false)]);

        let since = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(out.column("since", "t").unwrap().values, vec![Value::Timestamp(since), Value::Null]);
        assert_eq!(out.column("name", "t").unwrap().dtype, DataType::Utf8);
    }

    #[test]
    fn test_coercion_failure_reports_cell() {
        let types = dtypes(&[("name", DataType::Float64)]);
        let err = arrange(&raw(), &["name"], &types, &MemoryLog::new()).unwrap_err();
        assert_eq!(
            err,
            TableError::TypeCoercion {
                column: "name".to_string(),
                row: 0,
                value: "a".to_string(),
                target: DataType::Float64,
            }
        );
    }

    #[test]
    fn test_declared_type_is_not_trusted() {
        let column = Column::new("code", DataType::Int64, vec![Value::Int(1), Value::str("7")]);
        assert_eq!(
            coerce_column(column, DataType::Int64).unwrap().values,
            vec![Value::Int(1), Value::Int(7)]
        );

        let column = Column::new("code", DataType::Int64, vec![Value::Int(1), Value::str(" X ")]);
        let err = coerce_column(column, DataType::Int64).unwrap_err();
        assert!(matches!(err, TableError::TypeCoercion { row: 1, .. }));
    }

    #[test]
    fn test_mixed_column_fails_integer_coercion() {
        let table = Table::from_rows(&["code"], vec![vec![Value::Int(1)], vec![Value::str(" X ")]]).unwrap();
        let err = arrange(&table, &["code"], &dtypes(&[("code", DataType::Int64)]), &MemoryLog::new()).unwrap_err();
        assert!(matches!(err, TableError::TypeCoercion { row: 1, .. }));
    }

    #[test]
    fn test_missing_column() {
        let err = arrange(&raw(), &["name", "genre"], &BTreeMap::new(), &MemoryLog::new()).unwrap_err();
        assert!(matches!(err, TableError::Schema { .. }));

        let types = dtypes(&[("plays", DataType::Int64)]);
        let err = arrange(&raw(), &["name"], &types, &MemoryLog::new()).unwrap_err();
        assert!(matches!(err, TableError::Schema { .. }));
    }

    #[test]
    fn test_value_rules() {
        assert_eq!(coerce_value(&Value::Float(3.0), DataType::Int64), Some(Value::Int(3)));
        assert_eq!(coerce_value(&Value::Float(3.5), DataType::Int64), None);
        assert_eq!(coerce_value(&Value::Bool(true), DataType::Int64), Some(Value::Int(1)));
        assert_eq!(coerce_value(&Value::Int(2), DataType::Bool), None);
        assert_eq!(coerce_value(&Value::Int(7), DataType::Utf8), Some(Value::str("7")));
        assert_eq!(coerce_value(&Value::Float(f64::NAN), DataType::Int64), Some(Value::Null));
        assert_eq!(coerce_value(&Value::Int(1), DataType::Timestamp), None);
    }
}
