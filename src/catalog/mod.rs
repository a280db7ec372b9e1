//! Postgres-backed catalog
//!
//! Ingredients, recipes with their requirement lists, and per-user pantry
//! inventory. [`PgCatalog`] adapts these tables to the matcher's read contract.

pub mod ingredients;
pub mod inventory;
pub mod recipes;

pub use ingredients::{Ingredient, NewIngredient};
pub use inventory::{AddedItem, InventoryItem, NewInventoryItem};
pub use recipes::{NewRecipe, NewRecipeIngredient, Recipe, RecipeDetail, RecipeIngredient};

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::matching::{CatalogRecipe, CatalogSnapshot, IngredientId, SuggestionSource, UserId};

/// Suggestion source reading straight from Postgres
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SuggestionSource for PgCatalog {
    async fn recipes_with_requirements(&self) -> Result<Vec<CatalogRecipe>> {
        recipes::with_requirements(&self.pool)
            .await
            .map_err(|e| Error::data_unavailable("failed to read recipes", e))
    }

    async fn inventory_ingredient_ids(&self, user_id: UserId) -> Result<HashSet<IngredientId>> {
        inventory::ingredient_ids(&self.pool, user_id)
            .await
            .map_err(|e| Error::data_unavailable("failed to read inventory", e))
    }

    /// Reads recipes and inventory inside one repeatable-read transaction so a
    /// concurrent pantry edit is seen either entirely or not at all.
    #[instrument(skip(self))]
    async fn snapshot(&self, user_id: UserId) -> Result<CatalogSnapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::data_unavailable("failed to open catalog snapshot", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::data_unavailable("failed to open catalog snapshot", e))?;

        let recipes = recipes::with_requirements(&mut *tx)
            .await
            .map_err(|e| Error::data_unavailable("failed to read recipes", e))?;
        let inventory = inventory::ingredient_ids(&mut *tx, user_id)
            .await
            .map_err(|e| Error::data_unavailable("failed to read inventory", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::data_unavailable("failed to close catalog snapshot", e))?;

        debug!(
            "Catalog snapshot: {} recipes, {} pantry items",
            recipes.len(),
            inventory.len()
        );
        Ok(CatalogSnapshot { recipes, inventory })
    }
}
