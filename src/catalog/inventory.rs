//! Pantry inventory
//!
//! At most one row per (user, ingredient). Quantity and unit are informational;
//! the matcher only cares whether a row exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::collections::HashSet;
use tracing::{info, instrument};

use super::recipes::{validate_quantity, validate_unit};
use crate::error::{Error, Result};
use crate::matching::{IngredientId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: i32,
    /// Ingredient name
    pub ingredient: String,
    pub ingredient_id: IngredientId,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewInventoryItem {
    pub ingredient_id: IngredientId,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

/// Result of adding an ingredient to the pantry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedItem {
    pub id: i32,
    pub ingredient: String,
}

pub async fn list(pool: &PgPool, user_id: UserId) -> Result<Vec<InventoryItem>> {
    let items = sqlx::query_as::<_, InventoryItem>(
        r#"
        SELECT ui.id, i.name AS ingredient, ui.ingredient_id,
               ui.quantity::float8 AS quantity, ui.unit, ui.added_at
        FROM user_inventory ui
        JOIN ingredients i ON i.id = ui.ingredient_id
        WHERE ui.user_id = $1
        ORDER BY ui.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Add an ingredient to a user's pantry.
///
/// `NotFound` for an unknown ingredient, `Conflict` when the user already holds it.
#[instrument(skip(pool))]
pub async fn add(pool: &PgPool, user_id: UserId, item: &NewInventoryItem) -> Result<AddedItem> {
    validate_quantity(item.quantity)?;
    validate_unit(item.unit.as_deref())?;

    let ingredient: String = sqlx::query_scalar("SELECT name FROM ingredients WHERE id = $1")
        .bind(item.ingredient_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found("Ingredient", item.ingredient_id))?;

    let id: Option<i32> = sqlx::query_scalar(
        r#"
        INSERT INTO user_inventory (user_id, ingredient_id, quantity, unit)
        VALUES ($1, $2, $3::numeric, $4)
        ON CONFLICT (user_id, ingredient_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(item.ingredient_id)
    .bind(item.quantity)
    .bind(&item.unit)
    .fetch_optional(pool)
    .await?;

    let id = id.ok_or_else(|| {
        Error::conflict(format!("Ingredient '{}' already in inventory", ingredient))
    })?;

    info!("🧺 Added {} to inventory of user {}", ingredient, user_id);
    Ok(AddedItem { id, ingredient })
}

/// Remove an ingredient from a user's pantry
#[instrument(skip(pool))]
pub async fn remove(pool: &PgPool, user_id: UserId, ingredient_id: IngredientId) -> Result<()> {
    let result =
        sqlx::query("DELETE FROM user_inventory WHERE user_id = $1 AND ingredient_id = $2")
            .bind(user_id)
            .bind(ingredient_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("Inventory item", ingredient_id));
    }
    Ok(())
}

/// Replace quantity and unit of an existing pantry entry
#[instrument(skip(pool))]
pub async fn update(
    pool: &PgPool,
    user_id: UserId,
    ingredient_id: IngredientId,
    quantity: f64,
    unit: &str,
) -> Result<()> {
    validate_quantity(Some(quantity))?;
    validate_unit(Some(unit))?;

    let result = sqlx::query(
        r#"
        UPDATE user_inventory
        SET quantity = $3::numeric, unit = $4
        WHERE user_id = $1 AND ingredient_id = $2
        "#,
    )
    .bind(user_id)
    .bind(ingredient_id)
    .bind(quantity)
    .bind(unit)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("Inventory item", ingredient_id));
    }
    Ok(())
}

/// Set of ingredient ids the user holds
pub async fn ingredient_ids<'e, E>(executor: E, user_id: UserId) -> Result<HashSet<IngredientId>>
where
    E: PgExecutor<'e>,
{
    let ids = sqlx::query_scalar::<_, IngredientId>(
        "SELECT ingredient_id FROM user_inventory WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;
    Ok(ids.into_iter().collect())
}
