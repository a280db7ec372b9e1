//! Recipe Matching Module
//!
//! Suggests recipes the user can cook with what is already in their pantry.
//!
//! ## Architecture
//!
//! 1. **Source** - Read contracts over the recipe catalog and a user's inventory
//! 2. **Engine** - Coverage scoring, filtering and deterministic ranking
//! 3. **Metrics** - Timing and counters around each suggestion request
//!
//! ## Algorithm Overview
//!
//! For every recipe with at least one required ingredient:
//! - `total` distinct required ingredients, `matched` of them in the pantry
//! - recipes missing more than `max_missing` ingredients are dropped
//! - `match_percent` is `matched / total * 100`, rounded half-up
//! - survivors are ordered by match percent (desc), missing count (asc), recipe id (asc)

pub mod engine;
pub mod metrics;
pub mod source;

pub use engine::{find_matching_recipes, match_percent, MatchQuery, MatchingEngine, RecipeMatch};
pub use source::{CatalogRecipe, CatalogSnapshot, RequiredIngredient, SuggestionSource};

/// Ingredient primary key
pub type IngredientId = i32;
/// Recipe primary key
pub type RecipeId = i32;
/// Owner of an inventory
pub type UserId = i32;
