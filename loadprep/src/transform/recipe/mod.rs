//! Recipes: declarative pipelines over named tables
//!
//! This module provides:
//! - `definition`: Recipe document (sources, steps, failure policy)
//! - `steps`: Available pipeline steps
//! - `executor`: Run steps over a catalog and a sink
//!
//! ## Usage Flow
//!
//! ```text
//! recipe.json → validate_recipe → Recipe → load sources → execute → sink
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use loadprep::recipe::{execute, Catalog, Recipe};
//! use loadprep::{parse_file_auto, MemorySink, ConsoleLog};
//!
//! let recipe = Recipe::from_json(&std::fs::read_to_string("recipe.json")?)?;
//!
//! let mut catalog = Catalog::new();
//! for (name, source) in &recipe.sources {
//!     catalog.insert(name, parse_file_auto(&source.path)?.table);
//! }
//!
//! let mut sink = MemorySink::new();
//! let result = execute(&recipe.steps, catalog, recipe.on_stage_failure, &mut sink, &ConsoleLog)?;
//! println!("{}", result.summary());
//! ```

pub mod definition;
pub mod executor;
pub mod steps;

// Re-exports for convenience
pub use definition::{example_recipe, example_ticker_recipe, FailurePolicy, Recipe, SourceSpec};
pub use executor::{execute, Catalog, ExecutionResult, LoadRecord, StepOutcome, StepStatus};
pub use steps::{steps_description, Step};
