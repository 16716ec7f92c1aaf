//! # Loadprep - Batch cleaning of tabular extracts before a warehouse load
//!
//! Loadprep reads raw CSV extracts, normalizes their categorical values,
//! builds deduplicated dimension tables with surrogate ids, swaps natural
//! keys for those ids, and hands the finished tables to a loader.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Recipe    │────▶│    Sink     │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (stages)   │     │ (COPY/CSV)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use loadprep::{run_recipe_file, ConsoleLog, RunOptions};
//! use std::path::Path;
//!
//! fn main() {
//!     let report = run_recipe_file(Path::new("recipe.json"), &RunOptions::default(), &ConsoleLog).unwrap();
//!     println!("{}", report.summary());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Table model (Table, Column, Value, DataType)
//! - [`logs`] - Logging collaborator passed to every stage
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Stages, recipes and the end-to-end pipeline
//! - [`sink`] - Load destinations
//! - [`validation`] - Recipe schema validation
//! - [`cache`] - Recipe registry

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Loading
pub mod sink;

// Validation
pub mod validation;

// Caching
pub mod cache;

pub use transform::{pipeline, recipe};

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError,
    CsvResult,
    PipelineError,
    PipelineResult,
    RegistryError,
    RegistryResult,
    SinkError,
    SinkResult,
    StageError,
    StageResult,
    TableError,
    TableResult,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Column, DataType, Table, Value, ValueKey};

// =============================================================================
// Re-exports - Logging
// =============================================================================

pub use logs::{init_tracing, ConsoleLog, LogEntry, LogLevel, MemoryLog, PipelineLog, TeeLog, TracingLog};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_file_auto,
    parse_file_with_delimiter,
    parse_string_with_metadata,
    parse_table,
    ParseResult,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use transform::{
    arrange,
    build,
    clean_tickers,
    drop_future,
    filter_by_reference,
    fuzzy_match_column,
    map_to_id,
    match_value,
    normalize_ticker,
    similarity,
    validate_ticker_format,
    BuildOptions,
    CleanedTickers,
    IdTiming,
    SimilarityMetric,
    TickerRange,
    TickerReport,
};

// =============================================================================
// Re-exports - Recipes
// =============================================================================

pub use transform::recipe::{
    example_recipe,
    example_ticker_recipe,
    execute,
    steps_description,
    Catalog,
    ExecutionResult,
    FailurePolicy,
    LoadRecord,
    Recipe,
    SourceSpec,
    Step,
    StepOutcome,
    StepStatus,
};

// =============================================================================
// Re-exports - Registry (Cache)
// =============================================================================

pub use cache::{RecipeRegistry, StoredRecipe};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    parse_recipe,
    run_recipe,
    run_recipe_file,
    RunOptions,
    RunReport,
    SourceInfo,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, is_valid_recipe, validate, validate_recipe};

// =============================================================================
// Re-exports - Sink
// =============================================================================

pub use sink::{copy_statement, CsvDirectorySink, Destination, MemorySink, TableSink};
