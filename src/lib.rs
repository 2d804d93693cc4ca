//! songlike - "songs like X" recommendations over audio features
//!
//! - Min-max normalized feature matrix built once per catalog
//! - Weighted cosine ranking with query exclusion and (title, artist) dedup
//! - Fuzzy title resolution for misspelled queries
//! - Read-only table proxy over Snowflake or JSON files

pub mod types;
pub mod error;
pub mod config;
pub mod loader;
pub mod scoring;
pub mod selection;
pub mod engine;
pub mod resolver;
pub mod sources;
pub mod snowflake_client;
pub mod server;

pub use types::*;
pub use error::{LoadError, RecommendError, SourceError, WeightError};
pub use engine::{RecommendEngine, SharedRecommendEngine};
pub use resolver::{
    lookup_title, FuzzyTitleResolver, TitleLookup, TitleResolver, MIN_SUGGESTION_SCORE,
};
pub use sources::{JsonFileSource, StaticSource, TableSource};
pub use snowflake_client::{SnowflakeConfig, SnowflakeSource};
