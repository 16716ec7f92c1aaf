//! Transformation module.
//!
//! This module holds the table stages and the machinery that chains them:
//! - Stages: similarity, fuzzy, builder, dates, ticker, reference, mapping, arrange
//! - Recipe: Declarative steps and their executor
//! - Pipeline: Run a recipe file end to end

pub mod arrange;
pub mod builder;
pub mod dates;
pub mod fuzzy;
pub mod mapping;
pub mod pipeline;
pub mod recipe;
pub mod reference;
pub mod similarity;
pub mod ticker;

pub use arrange::{arrange, coerce_column, coerce_value};
pub use builder::{build, build_at, BuildOptions, IdTiming};
pub use dates::{drop_future, drop_future_at, parse_timestamp};
pub use fuzzy::{fuzzy_match_column, match_value, match_value_with, MISSING_SENTINEL};
pub use mapping::map_to_id;
pub use reference::filter_by_reference;
pub use similarity::{similarity, SimilarityMetric};
pub use ticker::{
    clean_tickers, normalize_ticker, validate_ticker_format, CleanedTickers, TickerRange, TickerReport,
};
