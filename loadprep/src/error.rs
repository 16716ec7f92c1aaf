//! Error types for the loadprep cleaning pipeline.
//!
//! - [`TableError`] - Schema, coercion and input errors raised by stages
//! - [`StageError`] - Tagged failure returned by composite stages
//! - [`CsvError`] - CSV source errors
//! - [`SinkError`] - Persistence sink errors
//! - [`RegistryError`] - Recipe registry errors
//! - [`ValidationError`] - Recipe document validation errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::DataType;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised while a stage reads or reshapes a table.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TableError {
    /// A referenced column is absent.
    #[error("Missing column '{column}' in {context}")]
    Schema { column: String, context: String },

    /// A value could not be converted to the declared type.
    #[error("Cannot coerce value '{value}' in column '{column}' (row {row}) to {target}")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
        target: DataType,
    },

    /// A required non-empty input was empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Columns of mismatched length or duplicated names.
    #[error("Malformed table: {0}")]
    Shape(String),
}

impl TableError {
    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        TableError::Schema {
            column: column.into(),
            context: context.into(),
        }
    }
}

// =============================================================================
// Stage Errors
// =============================================================================

/// Failure of a composite stage (`build`, `map_to_id`).
///
/// The stage has already logged the cause; callers decide whether the
/// run aborts or the stage is skipped.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Stage '{stage}' failed: {reason}")]
pub struct StageError {
    pub stage: String,
    pub reason: TableError,
}

impl StageError {
    pub fn new(stage: impl Into<String>, reason: TableError) -> Self {
        Self {
            stage: stage.into(),
            reason,
        }
    }
}

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading a CSV source.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the content.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Malformed record.
    #[error("Line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        CsvError::ParseError {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors from a persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Sink CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Destination name that cannot be used as a path or identifier.
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the recipe registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Recipe not found.
    #[error("Recipe not found: {0}")]
    NotFound(String),

    /// Invalid recipe data.
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors while validating a recipe document.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Schema validation failed.
    #[error("Recipe failed schema validation: {}", errors.join("; "))]
    SchemaError { errors: Vec<String> },

    /// The embedded schema itself could not be compiled.
    #[error("Invalid embedded schema: {0}")]
    InvalidSchema(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::run_recipe_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV source error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Stage error that halts the run.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Composite stage failure under the abort policy.
    #[error("{0}")]
    StageFailed(#[from] StageError),

    /// Sink error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Recipe document error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Recipe could not be deserialized.
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// A step referenced a table that was never loaded or produced.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Recipe has no steps.
    #[error("Recipe has no steps")]
    EmptyInput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for composite stages.
pub type StageResult<T> = Result<T, StageError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
