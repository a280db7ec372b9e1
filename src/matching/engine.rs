//! Matching Engine
//!
//! Core algorithm for suggesting recipes from a user's pantry. Scores every
//! recipe by how many of its distinct required ingredients the user already
//! holds, drops recipes missing too many, and ranks the rest deterministically.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument};

use super::metrics::{self, PerformanceTimer, SuggestionStats, SLOW_RANKING_MS};
use super::source::{CatalogRecipe, SuggestionSource};
use super::{IngredientId, RecipeId, UserId};
use crate::error::{Error, Result};

/// Catalogs at least this large are scored on the rayon pool
const PARALLEL_THRESHOLD: usize = 512;

/// A recipe that survived filtering, with its coverage statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeMatch {
    pub id: RecipeId,
    pub name: String,
    pub description: Option<String>,
    pub cooking_time: Option<i32>,
    pub total_ingredients: u32,
    pub matched_ingredients: u32,
    pub missing_count: u32,
    /// 0-100, rounded half-up
    pub match_percent: u32,
    /// Missing ingredient names in the order the recipe declares them
    pub missing_ingredients: Vec<String>,
}

/// Validated suggestion parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchQuery {
    pub max_missing: u32,
    pub limit: usize,
}

/// `round(matched / total * 100)` with halves rounded up, in integer arithmetic.
///
/// Callers guarantee `total > 0` and `matched <= total`.
pub fn match_percent(matched: u32, total: u32) -> u32 {
    debug_assert!(total > 0 && matched <= total);
    let (matched, total) = (u64::from(matched), u64::from(total));
    ((200 * matched + total) / (2 * total)) as u32
}

/// Score, filter and rank `recipes` against the ingredients in `inventory`.
pub fn find_matching_recipes(
    recipes: &[CatalogRecipe],
    inventory: &HashSet<IngredientId>,
    query: MatchQuery,
) -> Vec<RecipeMatch> {
    let mut matches: Vec<RecipeMatch> = if recipes.len() >= PARALLEL_THRESHOLD {
        recipes
            .par_iter()
            .filter_map(|recipe| score_recipe(recipe, inventory, query.max_missing))
            .collect()
    } else {
        recipes
            .iter()
            .filter_map(|recipe| score_recipe(recipe, inventory, query.max_missing))
            .collect()
    };

    matches.sort_unstable_by(rank_order);
    matches.truncate(query.limit);
    matches
}

/// Coverage of a single recipe, or `None` when it has no requirements or is
/// missing more than `max_missing` ingredients.
fn score_recipe(
    recipe: &CatalogRecipe,
    inventory: &HashSet<IngredientId>,
    max_missing: u32,
) -> Option<RecipeMatch> {
    // First declaration wins for repeated ingredients
    let mut seen = HashSet::with_capacity(recipe.requirements.len());
    let mut total = 0u32;
    let mut missing_ingredients = Vec::new();

    for requirement in &recipe.requirements {
        if !seen.insert(requirement.ingredient_id) {
            continue;
        }
        total += 1;
        if !inventory.contains(&requirement.ingredient_id) {
            missing_ingredients.push(requirement.name.clone());
        }
    }

    if total == 0 {
        return None;
    }

    let missing_count = missing_ingredients.len() as u32;
    if missing_count > max_missing {
        return None;
    }

    let matched = total - missing_count;
    Some(RecipeMatch {
        id: recipe.id,
        name: recipe.name.clone(),
        description: recipe.description.clone(),
        cooking_time: recipe.cooking_time,
        total_ingredients: total,
        matched_ingredients: matched,
        missing_count,
        match_percent: match_percent(matched, total),
        missing_ingredients,
    })
}

/// Match percent descending, then missing count ascending, then recipe id ascending
fn rank_order(a: &RecipeMatch, b: &RecipeMatch) -> Ordering {
    b.match_percent
        .cmp(&a.match_percent)
        .then_with(|| a.missing_count.cmp(&b.missing_count))
        .then_with(|| a.id.cmp(&b.id))
}

/// Suggestion service over a catalog source
#[derive(Clone)]
pub struct MatchingEngine<S> {
    source: S,
    fetch_timeout: Duration,
}

impl<S> MatchingEngine<S>
where
    S: SuggestionSource,
{
    pub fn new(source: S, fetch_timeout: Duration) -> Self {
        Self {
            source,
            fetch_timeout,
        }
    }

    /// Ranked suggestions for `user_id`.
    ///
    /// `query` must already be validated. Failed or timed-out reads surface as
    /// errors; an empty vector means no recipe qualified.
    #[instrument(skip(self), fields(max_missing = query.max_missing, limit = query.limit))]
    pub async fn suggest(&self, user_id: UserId, query: MatchQuery) -> Result<Vec<RecipeMatch>> {
        let timer = PerformanceTimer::new("suggest");

        let snapshot = match tokio::time::timeout(self.fetch_timeout, self.source.snapshot(user_id))
            .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                metrics::record_failure();
                return Err(e);
            }
            Err(_) => {
                metrics::record_failure();
                return Err(Error::DataUnavailable {
                    message: format!(
                        "catalog read exceeded {}ms",
                        self.fetch_timeout.as_millis()
                    )
                    .into(),
                    source: None,
                });
            }
        };

        let recipes_considered = snapshot.recipes.len();
        let ranking_timer = PerformanceTimer::new("rank_recipes");
        let matches = tokio::task::spawn_blocking(move || {
            find_matching_recipes(&snapshot.recipes, &snapshot.inventory, query)
        })
        .await?;
        ranking_timer.log_if_slow(SLOW_RANKING_MS);

        let stats = SuggestionStats::from_matches(recipes_considered, &matches);
        metrics::record_suggestion(&stats, timer.elapsed_ms());
        debug!(
            "Suggested {} of {} recipes for user {} ({} fully covered)",
            stats.suggestions_returned, stats.recipes_considered, user_id, stats.fully_covered
        );

        Ok(matches)
    }
}
