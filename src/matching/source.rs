//! Read contracts the matching engine consumes
//!
//! The engine never talks to storage directly. Anything that can list recipes
//! with their required ingredients and report which ingredients a user holds
//! can feed it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::{IngredientId, RecipeId, UserId};
use crate::error::Result;

/// One required ingredient of a recipe, as seen by the matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredIngredient {
    pub ingredient_id: IngredientId,
    pub name: String,
}

/// A recipe with its requirements in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecipe {
    pub id: RecipeId,
    pub name: String,
    pub description: Option<String>,
    pub cooking_time: Option<i32>,
    pub requirements: Vec<RequiredIngredient>,
}

/// Catalog and inventory read together for one suggestion request
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub recipes: Vec<CatalogRecipe>,
    pub inventory: HashSet<IngredientId>,
}

#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Every recipe, each with its requirement list materialized
    async fn recipes_with_requirements(&self) -> Result<Vec<CatalogRecipe>>;

    /// Ingredient ids present in the user's inventory
    async fn inventory_ingredient_ids(&self, user_id: UserId) -> Result<HashSet<IngredientId>>;

    /// Both reads for one request.
    ///
    /// Implementations backed by shared mutable storage should override this so
    /// that both reads observe the same snapshot.
    async fn snapshot(&self, user_id: UserId) -> Result<CatalogSnapshot> {
        let recipes = self.recipes_with_requirements().await?;
        let inventory = self.inventory_ingredient_ids(user_id).await?;
        Ok(CatalogSnapshot { recipes, inventory })
    }
}

#[async_trait]
impl<T> SuggestionSource for Arc<T>
where
    T: SuggestionSource + ?Sized,
{
    async fn recipes_with_requirements(&self) -> Result<Vec<CatalogRecipe>> {
        (**self).recipes_with_requirements().await
    }

    async fn inventory_ingredient_ids(&self, user_id: UserId) -> Result<HashSet<IngredientId>> {
        (**self).inventory_ingredient_ids(user_id).await
    }

    async fn snapshot(&self, user_id: UserId) -> Result<CatalogSnapshot> {
        (**self).snapshot(user_id).await
    }
}
