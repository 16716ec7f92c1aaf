//! Recipe executor
//!
//! Runs recipe steps over a catalog of named tables and hands `load` steps
//! to a sink.

use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use super::definition::FailurePolicy;
use super::steps::Step;
use crate::error::{PipelineError, PipelineResult, StageError};
use crate::logs::PipelineLog;
use crate::models::Table;
use crate::sink::{Destination, TableSink};
use crate::transform::arrange::arrange;
use crate::transform::builder::build_at;
use crate::transform::dates::drop_future_at;
use crate::transform::fuzzy::fuzzy_match_column;
use crate::transform::mapping::map_to_id;
use crate::transform::reference::filter_by_reference;
use crate::transform::ticker::{clean_tickers, validate_ticker_format, TickerReport};

/// Named tables available to steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        self.tables.insert(name.into(), table);
    }

    /// Table registered under `name`
    pub fn get(&self, name: &str) -> PipelineResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| PipelineError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    /// Failed under [`FailurePolicy::Skip`]
    Skipped,
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    /// 1-based position in the recipe
    pub index: usize,
    pub kind: String,
    pub description: String,
    pub status: StepStatus,
    /// Rows in the produced (or loaded) table
    pub rows: Option<usize>,
    /// Failure reason for skipped steps
    pub error: Option<String>,
    pub duration_ms: u128,
}

/// A table handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRecord {
    pub table: String,
    pub destination: Destination,
    pub rows: usize,
}

/// Result of executing a list of steps
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub catalog: Catalog,
    pub outcomes: Vec<StepOutcome>,
    pub ticker_reports: Vec<TickerReport>,
    pub loads: Vec<LoadRecord>,
}

impl ExecutionResult {
    /// Number of steps that were skipped
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Skipped)
            .count()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Executed: {} steps, {} skipped, {} tables loaded",
            self.outcomes.len(),
            self.skipped(),
            self.loads.len()
        )
    }
}

/// What a single step produced
enum StepOutput {
    Table(String, Table),
    Report(TickerReport),
    Loaded(LoadRecord),
}

/// Execute `steps` in order over `catalog`.
///
/// Failures of `build` and `map_to_id` follow `policy`; every other error
/// stops the run.
pub fn execute(
    steps: &[Step],
    catalog: Catalog,
    policy: FailurePolicy,
    sink: &mut dyn TableSink,
    log: &dyn PipelineLog,
) -> PipelineResult<ExecutionResult> {
    let mut result = ExecutionResult {
        catalog,
        ..Default::default()
    };

    for (i, step) in steps.iter().enumerate() {
        let index = i + 1;
        log.info(&format!("[{}/{}] {}", index, steps.len(), step.describe()));
        let started = Instant::now();

        let output = match run_step(step, &result.catalog, sink, log) {
            Ok(output) => output,
            Err(PipelineError::StageFailed(err)) if policy == FailurePolicy::Skip && step.is_soft() => {
                log.warning(&format!("Skipping step {}: {}", index, err));
                result.outcomes.push(skipped(index, step, &err, started));
                continue;
            }
            Err(err) => return Err(err),
        };

        let rows = match output {
            StepOutput::Table(name, table) => {
                let rows = table.row_count();
                result.catalog.insert(name, table);
                Some(rows)
            }
            StepOutput::Report(report) => {
                let rows = report.total;
                result.ticker_reports.push(report);
                Some(rows)
            }
            StepOutput::Loaded(record) => {
                let rows = record.rows;
                result.loads.push(record);
                Some(rows)
            }
        };

        result.outcomes.push(StepOutcome {
            index,
            kind: step.kind().to_string(),
            description: step.describe(),
            status: StepStatus::Completed,
            rows,
            error: None,
            duration_ms: started.elapsed().as_millis(),
        });
    }

    Ok(result)
}

fn skipped(index: usize, step: &Step, err: &StageError, started: Instant) -> StepOutcome {
    StepOutcome {
        index,
        kind: step.kind().to_string(),
        description: step.describe(),
        status: StepStatus::Skipped,
        rows: None,
        error: Some(err.to_string()),
        duration_ms: started.elapsed().as_millis(),
    }
}

fn output_name(step: &Step) -> String {
    step.output().unwrap_or_default().to_string()
}

fn run_step(
    step: &Step,
    catalog: &Catalog,
    sink: &mut dyn TableSink,
    log: &dyn PipelineLog,
) -> PipelineResult<StepOutput> {
    let now = Local::now().naive_local();

    let output = match step {
        Step::Build { name, from, columns, options } => {
            let table = build_at(name, catalog.get(from)?, columns, options, now, log)?;
            StepOutput::Table(name.clone(), table)
        }

        Step::DropFuture { table, column, .. } => {
            let out = drop_future_at(catalog.get(table)?, column, now, log)?;
            StepOutput::Table(output_name(step), out)
        }

        Step::CleanTickers { table, column, range, .. } => {
            let cleaned = clean_tickers(catalog.get(table)?, column, *range, log)?;
            StepOutput::Table(output_name(step), cleaned.table)
        }

        Step::ValidateTickers { table, column } => {
            StepOutput::Report(validate_ticker_format(catalog.get(table)?, column, log)?)
        }

        Step::FilterByReference { table, reference, column, .. } => {
            let out = filter_by_reference(catalog.get(table)?, catalog.get(reference)?, column, log)?;
            StepOutput::Table(output_name(step), out)
        }

        Step::MapToId { reference, ref_key, ref_id, target, target_key, .. } => {
            let out = map_to_id(
                catalog.get(reference)?,
                ref_key,
                ref_id,
                catalog.get(target)?,
                target_key,
                log,
            )?;
            StepOutput::Table(output_name(step), out)
        }

        Step::FuzzyMatch { table, column, targets, metric, .. } => {
            let out = fuzzy_match_column(catalog.get(table)?, column, targets, *metric, log)?;
            StepOutput::Table(output_name(step), out)
        }

        Step::Arrange { table, columns, dtypes, .. } => {
            let out = arrange(catalog.get(table)?, columns, dtypes, log)?;
            StepOutput::Table(output_name(step), out)
        }

        Step::Load { table, schema, target } => {
            let data = catalog.get(table)?;
            let destination = Destination::new(schema.as_str(), target.as_deref().unwrap_or(table))?;
            log.info(&format!("Inserting data into {}...", destination));
            let rows = sink.write(data, &destination)?;
            log.success(&format!("{} rows copied to the {} table.", rows, destination));
            StepOutput::Loaded(LoadRecord {
                table: table.clone(),
                destination,
                rows,
            })
        }
    };

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogLevel, MemoryLog};
    use crate::models::Value;
    use crate::sink::MemorySink;
    use crate::transform::builder::BuildOptions;

    fn raw() -> Table {
        Table::from_rows(
            &["title", "artist"],
            vec![
                vec![Value::str("So What"), Value::str("Miles Davis")],
                vec![Value::str("Blue in Green"), Value::str("miles davis ")],
                vec![Value::str("Giant Steps"), Value::str("John Coltrane")],
            ],
        )
        .unwrap()
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert("raw", raw());
        catalog
    }

    fn build_artists() -> Step {
        Step::Build {
            name: "artists".to_string(),
            from: "raw".to_string(),
            columns: vec!["artist".to_string()],
            options: BuildOptions::new().sort_by("artist").with_id("artist"),
        }
    }

    fn build_songs() -> Step {
        Step::Build {
            name: "songs".to_string(),
            from: "raw".to_string(),
            columns: vec!["title".to_string(), "artist".to_string()],
            options: BuildOptions::new(),
        }
    }

    fn map_artists() -> Step {
        Step::MapToId {
            reference: "artists".to_string(),
            ref_key: "artist".to_string(),
            ref_id: "artist_id".to_string(),
            target: "songs".to_string(),
            target_key: "artist".to_string(),
            into: None,
        }
    }

    #[test]
    fn test_build_map_and_load() {
        let steps = vec![
            build_artists(),
            build_songs(),
            map_artists(),
            Step::Load {
                table: "songs".to_string(),
                schema: "music".to_string(),
                target: None,
            },
        ];
        let mut sink = MemorySink::new();
        let result = execute(&steps, catalog(), FailurePolicy::Abort, &mut sink, &MemoryLog::new()).unwrap();

        assert_eq!(result.outcomes.len(), 4);
        assert_eq!(result.skipped(), 0);

        let songs = sink.get(&Destination::new("music", "songs").unwrap()).unwrap();
        assert_eq!(songs.column_names(), vec!["title", "artist_id"]);
        // "john coltrane" sorts before "miles davis"
        assert_eq!(
            songs.column("artist_id", "t").unwrap().values,
            vec![Value::Int(2), Value::Int(2), Value::Int(1)]
        );
        assert_eq!(result.loads[0].rows, 3);
    }

    #[test]
    fn test_abort_policy_stops_on_stage_failure() {
        let steps = vec![
            Step::Build {
                name: "labels".to_string(),
                from: "raw".to_string(),
                columns: vec!["label".to_string()],
                options: BuildOptions::new(),
            },
            build_artists(),
        ];
        let err = execute(&steps, catalog(), FailurePolicy::Abort, &mut MemorySink::new(), &MemoryLog::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed(_)));
    }

    #[test]
    fn test_skip_policy_continues() {
        let steps = vec![
            Step::Build {
                name: "labels".to_string(),
                from: "raw".to_string(),
                columns: vec!["label".to_string()],
                options: BuildOptions::new(),
            },
            build_artists(),
        ];
        let log = MemoryLog::new();
        let result = execute(&steps, catalog(), FailurePolicy::Skip, &mut MemorySink::new(), &log).unwrap();

        assert_eq!(result.outcomes[0].status, StepStatus::Skipped);
        assert!(result.outcomes[0].error.as_deref().unwrap_or("").contains("labels"));
        assert_eq!(result.outcomes[1].status, StepStatus::Completed);
        assert!(!result.catalog.contains("labels"));
        assert!(result.catalog.contains("artists"));
        assert!(log.contains(LogLevel::Warning, "Skipping step 1"));
    }

    #[test]
    fn test_hard_errors_ignore_skip_policy() {
        let steps = vec![Step::DropFuture {
            table: "raw".to_string(),
            column: "released".to_string(),
            into: None,
        }];
        let err = execute(&steps, catalog(), FailurePolicy::Skip, &mut MemorySink::new(), &MemoryLog::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Table(_)));
    }

    #[test]
    fn test_unknown_table() {
        let steps = vec![Step::ValidateTickers {
            table: "stocks".to_string(),
            column: "ticker_symbol".to_string(),
        }];
        let err = execute(&steps, catalog(), FailurePolicy::Abort, &mut MemorySink::new(), &MemoryLog::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTable(ref name) if name == "stocks"));
    }

    #[test]
    fn test_into_keeps_input() {
        let steps = vec![Step::FuzzyMatch {
            table: "raw".to_string(),
            column: "artist".to_string(),
            targets: vec!["miles davis".to_string(), "john coltrane".to_string()],
            metric: Default::default(),
            into: Some("matched".to_string()),
        }];
        let result = execute(&steps, catalog(), FailurePolicy::Abort, &mut MemorySink::new(), &MemoryLog::new())
            .unwrap();

        assert_eq!(result.catalog.get("raw").unwrap(), &raw());
        let matched = result.catalog.get("matched").unwrap();
        assert_eq!(matched.row(1)[1], &Value::str("miles davis"));
    }
}
