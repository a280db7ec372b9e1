//! Dinner Tonight library crate
//!
//! Re-exports core modules for the binaries and integration tests.

pub mod api;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod matching;

// Re-export commonly used types
pub use catalog::PgCatalog;
pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use matching::{MatchQuery, MatchingEngine, RecipeMatch, SuggestionSource};
