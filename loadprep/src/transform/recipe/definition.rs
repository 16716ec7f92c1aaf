//! Recipe definition
//!
//! A recipe names the CSV sources of a run and the ordered steps applied
//! to them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use super::steps::Step;
use crate::models::DataType;
use crate::transform::builder::{BuildOptions, IdTiming};
use crate::transform::ticker::TickerRange;

/// A complete pipeline recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Version of the recipe format
    #[serde(default = "default_version")]
    pub version: String,

    /// Short name used in reports and the registry
    #[serde(default)]
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Named CSV inputs
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,

    /// Steps, run in order
    pub steps: Vec<Step>,

    /// What to do when `build` or `map_to_id` fails
    #[serde(default)]
    pub on_stage_failure: FailurePolicy,
}

/// A CSV input of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// File path, relative to the recipe file
    pub path: PathBuf,

    /// Delimiter (auto-detected when omitted)
    #[serde(default)]
    pub delimiter: Option<char>,
}

/// Reaction to a failed composite stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run
    #[default]
    Abort,
    /// Record the failure and continue; the step's output is not produced
    Skip,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Recipe {
    /// Create an empty recipe
    pub fn new(name: &str) -> Self {
        Self {
            version: default_version(),
            name: name.to_string(),
            description: String::new(),
            sources: BTreeMap::new(),
            steps: Vec::new(),
            on_stage_failure: FailurePolicy::default(),
        }
    }

    /// Parse a recipe from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a recipe from JSON value
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_source(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.sources.insert(
            name.to_string(),
            SourceSpec {
                path: path.into(),
                delimiter: None,
            },
        );
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Tables written by loads, in step order
    pub fn loaded_tables(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Load { .. }))
            .flat_map(|s| s.inputs())
            .collect()
    }

    /// Check that every step reads a table that exists by the time it runs.
    ///
    /// Returns the offending `step N (kind): table` descriptions.
    pub fn check_references(&self) -> Result<(), Vec<String>> {
        let mut known: HashSet<&str> = self.sources.keys().map(String::as_str).collect();
        let mut missing = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            for input in step.inputs() {
                if !known.contains(input) {
                    missing.push(format!("step {} ({}): {}", i + 1, step.kind(), input));
                }
            }
            if let Some(output) = step.output() {
                known.insert(output);
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

/// Generate an example recipe for documentation
///
/// Cleans a music catalog extract: artists and genres become reference
/// tables with surrogate ids, songs get their genre snapped to the genre
/// vocabulary and their names replaced by ids before loading.
pub fn example_recipe() -> Recipe {
    let genres: Vec<String> = ["rock", "pop", "hip hop", "jazz", "classical", "electronic"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut dtypes = BTreeMap::new();
    dtypes.insert("artist_id".to_string(), DataType::Int64);
    dtypes.insert("genre_id".to_string(), DataType::Int64);
    dtypes.insert("release_date".to_string(), DataType::Timestamp);

    let mut recipe = Recipe::new("music-catalog")
        .with_source("raw", "catalog.csv")
        .with_step(Step::FuzzyMatch {
            table: "raw".to_string(),
            column: "genre".to_string(),
            targets: genres,
            metric: Default::default(),
            into: None,
        })
        .with_step(Step::Build {
            name: "artists".to_string(),
            from: "raw".to_string(),
            columns: vec!["artist".to_string()],
            options: BuildOptions::new().sort_by("artist").with_id("artist"),
        })
        .with_step(Step::Build {
            name: "genres".to_string(),
            from: "raw".to_string(),
            columns: vec!["genre".to_string()],
            options: BuildOptions::new().sort_by("genre").with_id("genre"),
        })
        .with_step(Step::Build {
            name: "songs".to_string(),
            from: "raw".to_string(),
            columns: vec![
                "title".to_string(),
                "artist".to_string(),
                "genre".to_string(),
                "release_date".to_string(),
            ],
            options: BuildOptions::new()
                .subset(["title"])
                .sort_by("title")
                .with_id("song")
                .date_column("release_date")
                .id_timing(IdTiming::AfterDateFilter),
        })
        .with_step(Step::MapToId {
            reference: "artists".to_string(),
            ref_key: "artist".to_string(),
            ref_id: "artist_id".to_string(),
            target: "songs".to_string(),
            target_key: "artist".to_string(),
            into: None,
        })
        .with_step(Step::MapToId {
            reference: "genres".to_string(),
            ref_key: "genre".to_string(),
            ref_id: "genre_id".to_string(),
            target: "songs".to_string(),
            target_key: "genre".to_string(),
            into: None,
        })
        .with_step(Step::Arrange {
            table: "songs".to_string(),
            columns: vec![
                "song_id".to_string(),
                "title".to_string(),
                "artist_id".to_string(),
                "genre_id".to_string(),
                "release_date".to_string(),
            ],
            dtypes,
            into: None,
        })
        .with_step(Step::Load {
            table: "artists".to_string(),
            schema: "music".to_string(),
            target: None,
        })
        .with_step(Step::Load {
            table: "genres".to_string(),
            schema: "music".to_string(),
            target: None,
        })
        .with_step(Step::Load {
            table: "songs".to_string(),
            schema: "music".to_string(),
            target: None,
        });

    recipe.description = "Clean a music catalog extract into artists, genres and songs".to_string();
    recipe
}

/// Example recipe for a trades extract: ticker cleanup and audit
pub fn example_ticker_recipe() -> Recipe {
    Recipe::new("stock-trades")
        .with_source("trades", "trades.csv")
        .with_source("stocks", "stocks.csv")
        .with_step(Step::CleanTickers {
            table: "stocks".to_string(),
            column: "ticker_symbol".to_string(),
            range: TickerRange::default(),
            into: None,
        })
        .with_step(Step::ValidateTickers {
            table: "trades".to_string(),
            column: "ticker_symbol".to_string(),
        })
        .with_step(Step::FilterByReference {
            table: "trades".to_string(),
            reference: "stocks".to_string(),
            column: "ticker_symbol".to_string(),
            into: None,
        })
        .with_step(Step::DropFuture {
            table: "trades".to_string(),
            column: "traded_at".to_string(),
            into: None,
        })
        .with_step(Step::Load {
            table: "trades".to_string(),
            schema: "market".to_string(),
            target: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_serialization() {
        let recipe = example_recipe();
        let json = recipe.to_json().unwrap();
        let parsed = Recipe::from_json(&json).unwrap();
        assert_eq!(parsed, recipe);
    }

    #[test]
    fn test_examples_reference_known_tables() {
        assert!(example_recipe().check_references().is_ok());
        assert!(example_ticker_recipe().check_references().is_ok());
    }

    #[test]
    fn test_check_references_reports_unknown_tables() {
        let recipe = Recipe::new("broken")
            .with_source("raw", "raw.csv")
            .with_step(Step::Load {
                table: "songs".to_string(),
                schema: "music".to_string(),
                target: None,
            });

        let missing = recipe.check_references().unwrap_err();
        assert_eq!(missing, vec!["step 1 (load): songs".to_string()]);
    }

    #[test]
    fn test_minimal_document_defaults() {
        let recipe = Recipe::from_json(r#"{"steps": []}"#).unwrap();
        assert_eq!(recipe.version, "1.0");
        assert_eq!(recipe.on_stage_failure, FailurePolicy::Abort);
        assert!(recipe.sources.is_empty());
    }

    #[test]
    fn test_loaded_tables() {
        assert_eq!(example_recipe().loaded_tables(), vec!["artists", "genres", "songs"]);
    }
}
