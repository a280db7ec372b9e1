//! Recipe catalog
//!
//! Recipes own an ordered list of required ingredients. Quantity, unit and
//! notes are kept for display only; matching looks at ingredient ids alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::matching::{CatalogRecipe, IngredientId, RecipeId, RequiredIngredient};

const MAX_NAME_LEN: usize = 255;
/// Longest unit the catalog and inventory accept
pub const MAX_UNIT_LEN: usize = 20;
const MAX_NOTES_LEN: usize = 100;
/// Largest quantity a `NUMERIC(10, 2)` column holds
pub const MAX_QUANTITY: f64 = 99_999_999.99;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub cooking_time: Option<i32>,
    pub servings: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A requirement row joined with its ingredient name
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecipeIngredient {
    pub id: i32,
    pub ingredient_id: IngredientId,
    pub ingredient: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

/// Recipe with its requirements in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<RecipeIngredient>,
}

/// Request body for creating a recipe
#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub cooking_time: Option<i32>,
    pub servings: Option<i32>,
    #[serde(default)]
    pub ingredients: Vec<NewRecipeIngredient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipeIngredient {
    pub ingredient_id: IngredientId,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

impl NewRecipe {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_argument("name", "must not be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::invalid_argument(
                "name",
                format!("must be at most {} characters", MAX_NAME_LEN),
            ));
        }
        if self.cooking_time.is_some_and(|t| t < 0) {
            return Err(Error::invalid_argument("cooking_time", "must not be negative"));
        }
        if self.servings.is_some_and(|s| s < 0) {
            return Err(Error::invalid_argument("servings", "must not be negative"));
        }

        for ingredient in &self.ingredients {
            validate_quantity(ingredient.quantity)?;
            validate_unit(ingredient.unit.as_deref())?;
            if ingredient
                .notes
                .as_deref()
                .is_some_and(|n| n.chars().count() > MAX_NOTES_LEN)
            {
                return Err(Error::invalid_argument(
                    "notes",
                    format!("must be at most {} characters", MAX_NOTES_LEN),
                ));
            }
        }

        Ok(())
    }
}

/// Quantities are optional but must be finite, nonnegative and fit the column
pub fn validate_quantity(quantity: Option<f64>) -> Result<()> {
    match quantity {
        Some(q) if !q.is_finite() || q < 0.0 => Err(Error::invalid_argument(
            "quantity",
            "must be a nonnegative number",
        )),
        Some(q) if q > MAX_QUANTITY => Err(Error::invalid_argument(
            "quantity",
            format!("must be at most {}", MAX_QUANTITY),
        )),
        _ => Ok(()),
    }
}

pub fn validate_unit(unit: Option<&str>) -> Result<()> {
    if unit.is_some_and(|u| u.chars().count() > MAX_UNIT_LEN) {
        return Err(Error::invalid_argument(
            "unit",
            format!("must be at most {} characters", MAX_UNIT_LEN),
        ));
    }
    Ok(())
}

/// Create a recipe and its requirements atomically.
///
/// Fails with `NotFound` when any requirement references an unknown ingredient;
/// nothing is written in that case.
#[instrument(skip(pool, new), fields(name = %new.name, ingredients = new.ingredients.len()))]
pub async fn create(pool: &PgPool, new: &NewRecipe) -> Result<RecipeDetail> {
    new.validate()?;

    let mut tx = pool.begin().await?;

    let requested: Vec<IngredientId> = new.ingredients.iter().map(|i| i.ingredient_id).collect();
    let known: HashSet<IngredientId> =
        sqlx::query_scalar::<_, IngredientId>("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(&requested)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();
    if let Some(missing) = requested.iter().find(|id| !known.contains(*id)) {
        return Err(Error::not_found("Ingredient", missing));
    }

    let recipe = sqlx::query_as::<_, Recipe>(
        r#"
        INSERT INTO recipes (name, description, instructions, cooking_time, servings)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, description, instructions, cooking_time, servings, created_at
        "#,
    )
    .bind(new.name.trim())
    .bind(&new.description)
    .bind(&new.instructions)
    .bind(new.cooking_time)
    .bind(new.servings)
    .fetch_one(&mut *tx)
    .await?;

    for ingredient in &new.ingredients {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit, notes)
            VALUES ($1, $2, $3::numeric, $4, $5)
            "#,
        )
        .bind(recipe.id)
        .bind(ingredient.ingredient_id)
        .bind(ingredient.quantity)
        .bind(&ingredient.unit)
        .bind(&ingredient.notes)
        .execute(&mut *tx)
        .await?;
    }

    let ingredients = fetch_requirements(&mut *tx, recipe.id).await?;
    tx.commit().await?;

    info!("🍲 Created recipe {} ({}) with {} ingredients", recipe.name, recipe.id, ingredients.len());
    Ok(RecipeDetail {
        recipe,
        ingredients,
    })
}

pub async fn list(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, name, description, instructions, cooking_time, servings, created_at
        FROM recipes
        ORDER BY id
        OFFSET $1 LIMIT $2
        "#,
    )
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(recipes)
}

pub async fn get(pool: &PgPool, id: RecipeId) -> Result<RecipeDetail> {
    let recipe = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, name, description, instructions, cooking_time, servings, created_at
        FROM recipes
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::not_found("Recipe", id))?;

    let ingredients = fetch_requirements(pool, id).await?;
    Ok(RecipeDetail {
        recipe,
        ingredients,
    })
}

pub async fn exists_by_name(pool: &PgPool, name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM recipes WHERE name = $1)")
            .bind(name.trim())
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

async fn fetch_requirements<'e, E>(executor: E, recipe_id: RecipeId) -> Result<Vec<RecipeIngredient>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, RecipeIngredient>(
        r#"
        SELECT ri.id, ri.ingredient_id, i.name AS ingredient,
               ri.quantity::float8 AS quantity, ri.unit, ri.notes
        FROM recipe_ingredients ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Flat row of the recipe/requirement join
#[derive(Debug, sqlx::FromRow)]
struct RequirementRow {
    recipe_id: RecipeId,
    recipe_name: String,
    description: Option<String>,
    cooking_time: Option<i32>,
    ingredient_id: Option<IngredientId>,
    ingredient_name: Option<String>,
}

/// Every recipe with its requirements, ordered by recipe id then declaration.
/// Recipes without requirements are included with an empty list.
pub async fn with_requirements<'e, E>(executor: E) -> Result<Vec<CatalogRecipe>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, RequirementRow>(
        r#"
        SELECT r.id AS recipe_id, r.name AS recipe_name, r.description, r.cooking_time,
               ri.ingredient_id, i.name AS ingredient_name
        FROM recipes r
        LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
        LEFT JOIN ingredients i ON i.id = ri.ingredient_id
        ORDER BY r.id, ri.id
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(group_requirement_rows(rows))
}

fn group_requirement_rows(rows: Vec<RequirementRow>) -> Vec<CatalogRecipe> {
    let mut recipes: Vec<CatalogRecipe> = Vec::new();

    for row in rows {
        if recipes.last().map(|r| r.id) != Some(row.recipe_id) {
            recipes.push(CatalogRecipe {
                id: row.recipe_id,
                name: row.recipe_name,
                description: row.description,
                cooking_time: row.cooking_time,
                requirements: Vec::new(),
            });
        }

        if let (Some(ingredient_id), Some(name), Some(recipe)) =
            (row.ingredient_id, row.ingredient_name, recipes.last_mut())
        {
            recipe.requirements.push(RequiredIngredient {
                ingredient_id,
                name,
            });
        }
    }

    recipes
}
