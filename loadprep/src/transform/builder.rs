//! Derived table construction: project, normalize, dedup, drop nulls,
//! sort, assign surrogate ids and drop future-dated rows.
//!
//! Every step is exposed on its own so call sites can compose a subset;
//! [`build`] runs them in their fixed order according to [`BuildOptions`].
//!
//! ```text
//! project ─▶ trim+lower ─▶ dedup ─▶ drop nulls ─▶ sort ─▶ ids ─▶ drop future
//! ```

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{StageError, StageResult, TableResult};
use crate::logs::PipelineLog;
use crate::models::{Column, DataType, Table, Value};

use super::dates::drop_future_at;

/// Where surrogate ids are assigned relative to the date filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdTiming {
    /// Ids follow dedup/null/sort; future-dated rows are removed afterwards
    /// and leave gaps in the id sequence.
    #[default]
    BeforeDateFilter,
    /// Ids are assigned last and stay contiguous over the final rows.
    AfterDateFilter,
}

/// Optional steps of [`build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Only these columns are checked for nulls
    #[serde(default)]
    pub subset: Option<Vec<String>>,

    /// Stable ascending sort key
    #[serde(default)]
    pub sort_column: Option<String>,

    /// Prefix of the `<prefix>_id` column to append
    #[serde(default)]
    pub id_column: Option<String>,

    /// Column whose future dates are dropped
    #[serde(default)]
    pub date_column: Option<String>,

    /// Drop rows with missing values
    #[serde(default = "default_drop_nulls")]
    pub drop_nulls: bool,

    #[serde(default)]
    pub id_timing: IdTiming,
}

fn default_drop_nulls() -> bool {
    true
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            subset: None,
            sort_column: None,
            id_column: None,
            date_column: None,
            drop_nulls: default_drop_nulls(),
            id_timing: IdTiming::default(),
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subset<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.subset = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>) -> Self {
        self.sort_column = Some(column.into());
        self
    }

    pub fn with_id(mut self, prefix: impl Into<String>) -> Self {
        self.id_column = Some(prefix.into());
        self
    }

    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    pub fn keep_nulls(mut self) -> Self {
        self.drop_nulls = false;
        self
    }

    pub fn id_timing(mut self, timing: IdTiming) -> Self {
        self.id_timing = timing;
        self
    }
}

/// Name of the id column generated for `prefix`.
pub fn id_column_name(prefix: &str) -> String {
    format!("{}_id", prefix)
}

/// Build the derived table `name` from `source`.
///
/// Any failure is logged and returned as a [`StageError`] tagged with `name`.
pub fn build<S: AsRef<str>>(
    name: &str,
    source: &Table,
    columns: &[S],
    options: &BuildOptions,
    log: &dyn PipelineLog,
) -> StageResult<Table> {
    build_at(name, source, columns, options, Local::now().naive_local(), log)
}

/// [`build`] with an explicit "now" for the date filter.
pub fn build_at<S: AsRef<str>>(
    name: &str,
    source: &Table,
    columns: &[S],
    options: &BuildOptions,
    now: NaiveDateTime,
    log: &dyn PipelineLog,
) -> StageResult<Table> {
    log.info(&format!("Creating {}...", name));

    match run_steps(name, source, columns, options, now, log) {
        Ok(table) => {
            log.success(&format!(
                "{} table with {} rows and {} columns created.",
                name,
                table.row_count(),
                table.column_count()
            ));
            Ok(table)
        }
        Err(reason) => {
            log.error(&format!("Could not create {}: {}", name, reason));
            Err(StageError::new(name, reason))
        }
    }
}

fn run_steps<S: AsRef<str>>(
    name: &str,
    source: &Table,
    columns: &[S],
    options: &BuildOptions,
    now: NaiveDateTime,
    log: &dyn PipelineLog,
) -> TableResult<Table> {
    let mut table = source.select(columns, &format!("source of {}", name))?;
    table = normalize_text(&table);

    let before = table.row_count();
    table = drop_duplicates(&table);
    log.info(&format!("{} duplicate rows dropped.", before - table.row_count()));

    if options.drop_nulls {
        let before = table.row_count();
        table = drop_nulls(&table, options.subset.as_deref())?;
        let dropped = before - table.row_count();
        match &options.subset {
            Some(subset) => log.info(&format!(
                "{} rows where {} column contains NaN or null values dropped.",
                dropped,
                subset.join(", ")
            )),
            None => log.info(&format!("{} rows with NaN or null values dropped.", dropped)),
        }
    }

    if let Some(sort_column) = &options.sort_column {
        table = sort_by(&table, sort_column)?;
    }

    let ids_first = options.id_timing == IdTiming::BeforeDateFilter;
    if ids_first {
        if let Some(prefix) = &options.id_column {
            table = assign_ids(&table, prefix)?;
        }
    }

    if let Some(date_column) = &options.date_column {
        table = drop_future_at(&table, date_column, now, log)?;
    }

    if !ids_first {
        if let Some(prefix) = &options.id_column {
            table = assign_ids(&table, prefix)?;
        }
    }

    Ok(table)
}

/// Trim and lower-case every text column.
pub fn normalize_text(table: &Table) -> Table {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            if c.dtype != DataType::Utf8 {
                return c.clone();
            }
            let values = c
                .values
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Value::Str(s.trim().to_lowercase()),
                    other => other.clone(),
                })
                .collect();
            Column::new(c.name.clone(), c.dtype, values)
        })
        .collect();
    // Same names and lengths as the input
    Table::new(columns).unwrap_or_else(|_| table.clone())
}

/// Remove rows identical across every column, keeping first occurrences.
pub fn drop_duplicates(table: &Table) -> Table {
    let mut seen = HashSet::new();
    let keep: Vec<bool> = (0..table.row_count())
        .map(|i| seen.insert(table.row_key(i)))
        .collect();
    table.filter(&keep)
}

/// Remove rows with a missing value in `subset` (or in any column).
pub fn drop_nulls(table: &Table, subset: Option<&[String]>) -> TableResult<Table> {
    let checked: Vec<&Column> = match subset {
        Some(names) => names
            .iter()
            .map(|n| table.column(n, "null subset"))
            .collect::<TableResult<_>>()?,
        None => table.columns().iter().collect(),
    };

    let keep: Vec<bool> = (0..table.row_count())
        .map(|i| checked.iter().all(|c| !c.values[i].is_null()))
        .collect();
    Ok(table.filter(&keep))
}

/// Stable ascending sort on `column`, missing values last.
pub fn sort_by(table: &Table, column: &str) -> TableResult<Table> {
    let key = table.column(column, "sort input")?;
    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|&a, &b| {
        let (va, vb) = (&key.values[a], &key.values[b]);
        match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => va.sort_cmp(vb),
        }
    });
    Ok(table.take(&order))
}

/// Set `<prefix>_id` to `1..=row_count` in current row order.
///
/// An existing id column is overwritten in place, otherwise it is appended.
pub fn assign_ids(table: &Table, prefix: &str) -> TableResult<Table> {
    let name = id_column_name(prefix);
    let ids = (1..=table.row_count() as i64).map(Value::Int).collect();
    let mut out = table.clone();
    out.set_column(Column::new(name, DataType::Int64, ids))?;
    Ok(out)
}

/// Check a table's ids run `1..=N` without gaps, in row order.
pub fn ids_are_contiguous(table: &Table, id_column: &str) -> bool {
    match table.column(id_column, "id check") {
        Ok(col) => col
            .values
            .iter()
            .enumerate()
            .all(|(i, v)| v.as_i64() == Some(i as i64 + 1)),
        Err(_) => false,
    }
}
