//! Recipe steps
//!
//! Every stage of the pipeline as a serializable step. A step reads one or
//! more named tables from the catalog and, except for audits and loads,
//! writes its result back under `into` (or over its input when omitted).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::DataType;
use crate::transform::builder::BuildOptions;
use crate::transform::similarity::SimilarityMetric;
use crate::transform::ticker::TickerRange;

/// All available pipeline steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Derive a cleaned table from a source table
    Build {
        name: String,
        from: String,
        columns: Vec<String>,
        #[serde(default)]
        options: BuildOptions,
    },

    /// Drop rows dated after now
    DropFuture {
        table: String,
        column: String,
        #[serde(default)]
        into: Option<String>,
    },

    /// Canonicalize `stk` tickers and drop invalid rows
    CleanTickers {
        table: String,
        column: String,
        #[serde(default)]
        range: TickerRange,
        #[serde(default)]
        into: Option<String>,
    },

    /// Audit ticker format; never changes the table
    ValidateTickers {
        table: String,
        column: String,
    },

    /// Keep rows whose key exists in a reference table
    FilterByReference {
        table: String,
        reference: String,
        column: String,
        #[serde(default)]
        into: Option<String>,
    },

    /// Replace a natural key by the reference's surrogate id
    MapToId {
        reference: String,
        ref_key: String,
        ref_id: String,
        target: String,
        target_key: String,
        #[serde(default)]
        into: Option<String>,
    },

    /// Snap free text to a controlled vocabulary
    FuzzyMatch {
        table: String,
        column: String,
        targets: Vec<String>,
        #[serde(default)]
        metric: SimilarityMetric,
        #[serde(default)]
        into: Option<String>,
    },

    /// Final column order and types
    Arrange {
        table: String,
        columns: Vec<String>,
        #[serde(default)]
        dtypes: BTreeMap<String, DataType>,
        #[serde(default)]
        into: Option<String>,
    },

    /// Hand a table to the sink
    Load {
        table: String,
        schema: String,
        /// Destination table name (defaults to the catalog name)
        #[serde(default)]
        target: Option<String>,
    },
}

impl Step {
    /// Step type as written in recipes
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Build { .. } => "build",
            Step::DropFuture { .. } => "drop_future",
            Step::CleanTickers { .. } => "clean_tickers",
            Step::ValidateTickers { .. } => "validate_tickers",
            Step::FilterByReference { .. } => "filter_by_reference",
            Step::MapToId { .. } => "map_to_id",
            Step::FuzzyMatch { .. } => "fuzzy_match",
            Step::Arrange { .. } => "arrange",
            Step::Load { .. } => "load",
        }
    }

    /// Catalog tables this step reads
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Step::Build { from, .. } => vec![from.as_str()],
            Step::DropFuture { table, .. }
            | Step::CleanTickers { table, .. }
            | Step::ValidateTickers { table, .. }
            | Step::FuzzyMatch { table, .. }
            | Step::Arrange { table, .. }
            | Step::Load { table, .. } => vec![table.as_str()],
            Step::FilterByReference { table, reference, .. } => vec![table.as_str(), reference.as_str()],
            Step::MapToId { reference, target, .. } => vec![reference.as_str(), target.as_str()],
        }
    }

    /// Catalog table this step writes, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Step::Build { name, .. } => Some(name.as_str()),
            Step::DropFuture { table, into, .. }
            | Step::CleanTickers { table, into, .. }
            | Step::FilterByReference { table, into, .. }
            | Step::FuzzyMatch { table, into, .. }
            | Step::Arrange { table, into, .. } => Some(into.as_deref().unwrap_or(table)),
            Step::MapToId { target, into, .. } => Some(into.as_deref().unwrap_or(target)),
            Step::ValidateTickers { .. } | Step::Load { .. } => None,
        }
    }

    /// Whether a failure of this step may be skipped under
    /// [`FailurePolicy::Skip`](super::FailurePolicy::Skip)
    pub fn is_soft(&self) -> bool {
        matches!(self, Step::Build { .. } | Step::MapToId { .. })
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        match self {
            Step::Build { name, from, columns, .. } => {
                format!("build {} from {} [{}]", name, from, columns.join(", "))
            }
            Step::DropFuture { table, column, .. } => format!("drop future {}.{}", table, column),
            Step::CleanTickers { table, column, range, .. } => {
                format!("clean tickers {}.{} (stk{:03}..stk{:03})", table, column, range.min, range.max)
            }
            Step::ValidateTickers { table, column } => format!("validate tickers {}.{}", table, column),
            Step::FilterByReference { table, reference, column, .. } => {
                format!("filter {} by {}.{}", table, reference, column)
            }
            Step::MapToId { reference, ref_id, target, target_key, .. } => {
                format!("map {}.{} to {}.{}", target, target_key, reference, ref_id)
            }
            Step::FuzzyMatch { table, column, targets, .. } => {
                format!("fuzzy match {}.{} against {} targets", table, column, targets.len())
            }
            Step::Arrange { table, columns, .. } => format!("arrange {} [{}]", table, columns.join(", ")),
            Step::Load { table, schema, target } => {
                format!("load {} into {}.{}", table, schema, target.as_deref().unwrap_or(table))
            }
        }
    }
}

/// Get a description of all step types for help output
pub fn steps_description() -> &'static str {
    r#"
## Available Steps

### Cleaning
- `build`: Derive a table. Params: `name`, `from`, `columns`, `options`
  (`subset`, `sort_column`, `id_column`, `date_column`, `drop_nulls`,
  `id_timing`: "before_date_filter" | "after_date_filter")
- `drop_future`: Drop rows dated after now. Params: `table`, `column`, `into`?

### Tickers
- `clean_tickers`: Keep `stk` + number tickers, rewritten as stkNNN.
  Params: `table`, `column`, `range`? ({"min": 1, "max": 500}), `into`?
- `validate_tickers`: Report tickers not matching 3 letters + 3 digits.
  Params: `table`, `column`

### References
- `filter_by_reference`: Keep rows whose key exists in another table.
  Params: `table`, `reference`, `column`, `into`?
- `map_to_id`: Replace a name column by the reference id column.
  Params: `reference`, `ref_key`, `ref_id`, `target`, `target_key`, `into`?

### Vocabulary
- `fuzzy_match`: Snap values to the closest target.
  Params: `table`, `column`, `targets`, `metric`? ("gestalt" | "jaro_winkler" | "levenshtein"), `into`?

### Output
- `arrange`: Reorder and retype columns. Params: `table`, `columns`, `dtypes`?
  (column -> "int64" | "float64" | "utf8" | "bool" | "timestamp"), `into`?
- `load`: Write a table to the sink. Params: `table`, `schema`, `target`?
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_deserialization() {
        let step: Step = serde_json::from_value(json!({
            "type": "map_to_id",
            "reference": "artists",
            "ref_key": "artist",
            "ref_id": "artist_id",
            "target": "songs",
            "target_key": "artist"
        }))
        .unwrap();

        assert_eq!(step.kind(), "map_to_id");
        assert_eq!(step.inputs(), vec!["artists", "songs"]);
        assert_eq!(step.output(), Some("songs"));
        assert!(step.is_soft());
    }

    #[test]
    fn test_defaults_fill_in() {
        let step: Step = serde_json::from_value(json!({
            "type": "clean_tickers",
            "table": "stocks",
            "column": "ticker_symbol",
            "into": "clean_stocks"
        }))
        .unwrap();

        match &step {
            Step::CleanTickers { range, .. } => assert_eq!(*range, TickerRange::default()),
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(step.output(), Some("clean_stocks"));
        assert!(!step.is_soft());
    }

    #[test]
    fn test_audit_and_load_have_no_output() {
        let audit = Step::ValidateTickers { table: "t".into(), column: "c".into() };
        let load = Step::Load { table: "t".into(), schema: "s".into(), target: None };
        assert_eq!(audit.output(), None);
        assert_eq!(load.output(), None);
        assert_eq!(load.describe(), "load t into s.t");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<Step, _> = serde_json::from_value(json!({ "type": "explode", "table": "t" }));
        assert!(result.is_err());
    }
}
