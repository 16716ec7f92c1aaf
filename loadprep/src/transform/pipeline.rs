//! High-level API for running a recipe end to end.
//!
//! This module combines all steps: reading the recipe, validating it,
//! parsing the CSV sources, executing the steps and writing loads to a sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use loadprep::pipeline::{run_recipe_file, RunOptions};
//! use loadprep::ConsoleLog;
//! use std::path::Path;
//!
//! let report = run_recipe_file(Path::new("recipes/catalog.json"), &RunOptions::default(), &ConsoleLog)?;
//! println!("{}", report.summary());
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::logs::{LogEntry, MemoryLog, PipelineLog, TeeLog};
use crate::parser::{parse_file_auto, parse_file_with_delimiter};
use crate::sink::{CsvDirectorySink, TableSink};
use crate::transform::recipe::{execute, Catalog, FailurePolicy, LoadRecord, Recipe, StepOutcome};
use crate::transform::ticker::TickerReport;
use crate::validation::validate_recipe;

/// Environment variable overriding the default output directory
pub const OUTPUT_DIR_ENV: &str = "LOADPREP_OUTPUT_DIR";

const DEFAULT_OUTPUT_DIR: &str = "output";

/// Options for a recipe run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOptions {
    /// Root directory of the CSV sink
    pub output_dir: PathBuf,

    /// Skip JSON Schema validation of the recipe document
    pub skip_validation: bool,

    /// Overrides the recipe's `on_stage_failure`
    pub failure_policy: Option<FailurePolicy>,

    /// Write header lines in sink files
    pub with_header: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            skip_validation: false,
            failure_policy: None,
            with_header: false,
        }
    }
}

impl RunOptions {
    /// Defaults, with the output directory taken from `LOADPREP_OUTPUT_DIR` if set
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                options.output_dir = PathBuf::from(dir);
            }
        }
        options
    }
}

/// CSV source information
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub path: PathBuf,
    pub encoding: String,
    pub delimiter: char,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Result of a complete run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub recipe: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceInfo>,
    pub steps: Vec<StepOutcome>,
    pub ticker_reports: Vec<TickerReport>,
    pub loads: Vec<LoadRecord>,
    pub logs: Vec<LogEntry>,

    /// Tables present at the end of the run
    #[serde(skip)]
    pub catalog: Catalog,
}

impl RunReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        let skipped = self
            .steps
            .iter()
            .filter(|s| s.status == crate::transform::recipe::StepStatus::Skipped)
            .count();
        let rows: usize = self.loads.iter().map(|l| l.rows).sum();
        format!(
            "Run {}: {} steps ({} skipped), {} tables loaded, {} rows written in {} ms",
            self.run_id,
            self.steps.len(),
            skipped,
            self.loads.len(),
            rows,
            self.duration_ms()
        )
    }
}

/// Parse a recipe document, validating it against the recipe schema first.
pub fn parse_recipe(content: &str, validate: bool) -> PipelineResult<Recipe> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| PipelineError::InvalidRecipe(e.to_string()))?;
    if validate {
        validate_recipe(&value)?;
    }
    Recipe::from_value(&value).map_err(|e| PipelineError::InvalidRecipe(e.to_string()))
}

/// Run a recipe file, writing loads under `options.output_dir`.
///
/// Relative source paths are resolved against the recipe's directory.
pub fn run_recipe_file(path: &Path, options: &RunOptions, log: &dyn PipelineLog) -> PipelineResult<RunReport> {
    log.info(&format!("📜 Reading recipe {}...", path.display()));
    let content = std::fs::read_to_string(path)?;
    let recipe = parse_recipe(&content, !options.skip_validation)?;
    if options.skip_validation {
        log.info("(validation skipped)");
    } else {
        log.success("Recipe is valid");
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut sink = CsvDirectorySink::new(&options.output_dir).with_header(options.with_header);
    run_recipe(&recipe, base_dir, options, &mut sink, log)
}

/// Run an already parsed recipe against `sink`.
pub fn run_recipe(
    recipe: &Recipe,
    base_dir: &Path,
    options: &RunOptions,
    sink: &mut dyn TableSink,
    log: &dyn PipelineLog,
) -> PipelineResult<RunReport> {
    let started_at = Utc::now();
    let memory = MemoryLog::new();
    let log = TeeLog::new(log, &memory);

    if recipe.steps.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    recipe
        .check_references()
        .map_err(|missing| PipelineError::InvalidRecipe(format!("unknown tables: {}", missing.join(", "))))?;

    let (catalog, sources) = load_sources(recipe, base_dir, &log)?;

    let policy = options.failure_policy.unwrap_or(recipe.on_stage_failure);
    log.info(&format!("⚙️  Running {} steps...", recipe.steps.len()));
    let result = execute(&recipe.steps, catalog, policy, sink, &log)?;
    log.success(&result.summary());

    Ok(RunReport {
        run_id: Uuid::new_v4(),
        recipe: recipe.name.clone(),
        started_at,
        finished_at: Utc::now(),
        sources,
        steps: result.outcomes,
        ticker_reports: result.ticker_reports,
        loads: result.loads,
        logs: memory.entries(),
        catalog: result.catalog,
    })
}

/// Parse every recipe source into a catalog.
pub fn load_sources(
    recipe: &Recipe,
    base_dir: &Path,
    log: &dyn PipelineLog,
) -> PipelineResult<(Catalog, Vec<SourceInfo>)> {
    let mut catalog = Catalog::new();
    let mut infos = Vec::new();

    for (name, source) in &recipe.sources {
        let path = if source.path.is_absolute() {
            source.path.clone()
        } else {
            base_dir.join(&source.path)
        };
        log.info(&format!("📖 Reading {} from {}...", name, path.display()));

        let parsed = match source.delimiter {
            Some(delimiter) => parse_file_with_delimiter(&path, delimiter)?,
            None => parse_file_auto(&path)?,
        };
        log.info_indent(&format!("Detected encoding: {}", parsed.encoding), 1);
        log.info_indent(&format!("Separator: '{}'", format_delimiter(parsed.delimiter)), 1);
        log.success(&format!(
            "Read {} rows, {} columns",
            parsed.table.row_count(),
            parsed.table.column_count()
        ));

        infos.push(SourceInfo {
            name: name.clone(),
            path,
            encoding: parsed.encoding,
            delimiter: parsed.delimiter,
            rows: parsed.table.row_count(),
            columns: parsed.headers,
        });
        catalog.insert(name.clone(), parsed.table);
    }

    Ok((catalog, infos))
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
