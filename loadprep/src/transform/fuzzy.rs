//! Fuzzy matching of free text against a controlled vocabulary.

use crate::error::{TableError, TableResult};
use crate::logs::PipelineLog;
use crate::models::{Column, DataType, Table, Value};

use super::similarity::SimilarityMetric;

/// Returned for missing input values.
pub const MISSING_SENTINEL: &str = "n/a";

/// Best target for `value` under the default metric.
///
/// Missing values map to [`MISSING_SENTINEL`] whatever the targets are.
/// Ties go to the earliest target in `targets`.
pub fn match_value(value: &Value, targets: &[String]) -> TableResult<String> {
    match_value_with(value, targets, SimilarityMetric::Gestalt)
}

pub fn match_value_with(
    value: &Value,
    targets: &[String],
    metric: SimilarityMetric,
) -> TableResult<String> {
    if value.is_null() {
        return Ok(MISSING_SENTINEL.to_string());
    }
    if targets.is_empty() {
        return Err(TableError::InvalidInput(
            "fuzzy match needs at least one target".to_string(),
        ));
    }

    let word = value.to_string();
    let mut best = &targets[0];
    let mut best_score = metric.score(&word, best);
    for target in &targets[1..] {
        let score = metric.score(&word, target);
        if score > best_score {
            best = target;
            best_score = score;
        }
    }
    Ok(best.clone())
}

/// Replace every value of `column` with its best match among `targets`.
///
/// The column becomes `Utf8`. Logs how many values were rewritten.
pub fn fuzzy_match_column(
    table: &Table,
    column: &str,
    targets: &[String],
    metric: SimilarityMetric,
    log: &dyn PipelineLog,
) -> TableResult<Table> {
    let source = table.column(column, "fuzzy match input")?;
    if targets.is_empty() {
        return Err(TableError::InvalidInput(format!("no targets to match {} against", column)));
    }
    log.info(&format!("Matching {} against {} targets...", column, targets.len()));

    let matched = source
        .values
        .iter()
        .map(|v| match_value_with(v, targets, metric).map(Value::Str))
        .collect::<TableResult<Vec<_>>>()?;

    let changed = source
        .values
        .iter()
        .zip(&matched)
        .filter(|(before, after)| before.as_str() != after.as_str())
        .count();

    let mut out = table.clone();
    out.replace_column(Column::new(column, DataType::Utf8, matched))?;
    log.info(&format!("{} values in {} rewritten to a vocabulary term.", changed, column));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::MemoryLog;

    fn targets() -> Vec<String> {
        ["rock", "pop", "hip hop", "jazz"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_null_is_sentinel() {
        assert_eq!(match_value(&Value::Null, &targets()).unwrap(), "n/a");
        assert_eq!(match_value(&Value::Float(f64::NAN), &targets()).unwrap(), "n/a");
    }

    #[test]
    fn test_best_match() {
        assert_eq!(match_value(&Value::str("Rokc"), &targets()).unwrap(), "rock");
        assert_eq!(match_value(&Value::str("hiphop"), &targets()).unwrap(), "hip hop");
    }

    #[test]
    fn test_tie_goes_to_first_target() {
        let t: Vec<String> = vec!["ab".into(), "ba".into()];
        // both score 2/3 against "a"
        assert_eq!(match_value(&Value::str("a"), &t).unwrap(), "ab");
        let reversed: Vec<String> = vec!["ba".into(), "ab".into()];
        assert_eq!(match_value(&Value::str("a"), &reversed).unwrap(), "ba");
    }

    #[test]
    fn test_non_string_is_coerced() {
        let t: Vec<String> = vec!["1999".into(), "2024".into()];
        assert_eq!(match_value(&Value::Int(2024), &t).unwrap(), "2024");
    }

    #[test]
    fn test_empty_targets_rejected() {
        let err = match_value(&Value::str("x"), &[]).unwrap_err();
        assert!(matches!(err, TableError::InvalidInput(_)));
        // missing values never look at the targets
        assert_eq!(match_value(&Value::Null, &[]).unwrap(), "n/a");
    }

    #[test]
    fn test_column_stage() {
        let table = Table::from_rows(
            &["genre"],
            vec![vec![Value::str("rock")], vec![Value::str("jaz")], vec![Value::Null]],
        )
        .unwrap();
        let log = MemoryLog::new();
        let out = fuzzy_match_column(&table, "genre", &targets(), SimilarityMetric::Gestalt, &log).unwrap();

        let values = &out.column("genre", "t").unwrap().values;
        assert_eq!(values, &vec![Value::str("rock"), Value::str("jazz"), Value::str("n/a")]);
        assert!(log.messages().iter().any(|m| m.starts_with("2 values")));
    }
}
