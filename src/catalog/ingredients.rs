//! Ingredient catalog
//!
//! Ingredients are identified by their canonical name: trimmed and lower-cased.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::matching::IngredientId;

/// Longest name the catalog accepts
pub const MAX_NAME_LEN: usize = 100;
/// Longest category the catalog accepts
pub const MAX_CATEGORY_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub category: Option<String>,
}

/// Request body for creating an ingredient
#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub category: Option<String>,
}

/// Canonical form used for identity and lookups
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn validate(name: &str, category: Option<&str>) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::invalid_argument(
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    if category.is_some_and(|c| c.chars().count() > MAX_CATEGORY_LEN) {
        return Err(Error::invalid_argument(
            "category",
            format!("must be at most {} characters", MAX_CATEGORY_LEN),
        ));
    }
    Ok(())
}

/// Escape `%`, `_` and `\` so user input matches literally inside a LIKE pattern
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Create an ingredient, rejecting names that already exist.
#[instrument(skip(pool))]
pub async fn create(pool: &PgPool, new: &NewIngredient) -> Result<Ingredient> {
    let name = normalize_name(&new.name);
    let category = normalize_category(new.category.as_deref());
    validate(&name, category.as_deref())?;

    if find_by_name(pool, &name).await?.is_some() {
        return Err(Error::conflict(format!("Ingredient '{}' already exists", name)));
    }

    // A concurrent insert of the same name surfaces as a unique violation -> Conflict
    let ingredient = sqlx::query_as::<_, Ingredient>(
        r#"
        INSERT INTO ingredients (name, category)
        VALUES ($1, $2)
        RETURNING id, name, category
        "#,
    )
    .bind(&name)
    .bind(&category)
    .fetch_one(pool)
    .await?;

    info!("🥕 Created ingredient {} ({})", ingredient.name, ingredient.id);
    Ok(ingredient)
}

/// Resolve an ingredient by name, creating it when missing. Never conflicts.
#[instrument(skip(pool))]
pub async fn find_or_create(pool: &PgPool, name: &str, category: Option<&str>) -> Result<Ingredient> {
    let name = normalize_name(name);
    let category = normalize_category(category);
    validate(&name, category.as_deref())?;

    let inserted = sqlx::query_as::<_, Ingredient>(
        r#"
        INSERT INTO ingredients (name, category)
        VALUES ($1, $2)
        ON CONFLICT (name) DO NOTHING
        RETURNING id, name, category
        "#,
    )
    .bind(&name)
    .bind(&category)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(ingredient) => {
            debug!("Created ingredient {}", ingredient.name);
            Ok(ingredient)
        }
        None => find_by_name(pool, &name)
            .await?
            .ok_or_else(|| Error::not_found("Ingredient", &name)),
    }
}

/// Exact lookup by canonical name
pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Ingredient>> {
    let ingredient = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, category FROM ingredients WHERE name = $1",
    )
    .bind(normalize_name(name))
    .fetch_optional(pool)
    .await?;
    Ok(ingredient)
}

pub async fn get(pool: &PgPool, id: IngredientId) -> Result<Ingredient> {
    sqlx::query_as::<_, Ingredient>("SELECT id, name, category FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found("Ingredient", id))
}

/// Case-insensitive substring search over ingredient names
#[instrument(skip(pool))]
pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Ingredient>> {
    let needle = normalize_name(query);
    if needle.is_empty() {
        return Err(Error::invalid_argument("q", "search query must not be empty"));
    }

    let pattern = format!("%{}%", escape_like(&needle));
    let ingredients = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, category
        FROM ingredients
        WHERE name ILIKE $1
        ORDER BY name
        LIMIT $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(ingredients)
}

pub async fn list(pool: &PgPool, skip: i64, limit: i64) -> Result<Vec<Ingredient>> {
    let ingredients = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, category FROM ingredients ORDER BY id OFFSET $1 LIMIT $2",
    )
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(ingredients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Chicken Breast "), "chicken breast");
        assert_eq!(normalize_name("OLIVE OIL"), "olive oil");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_normalize_category_drops_blank() {
        assert_eq!(normalize_category(Some(" protein ")), Some("protein".to_string()));
        assert_eq!(normalize_category(Some("  ")), None);
        assert_eq!(normalize_category(None), None);
    }

    #[test]
    fn test_validate_rejects_empty_and_long_names() {
        assert!(validate("rice", Some("grain")).is_ok());
        assert!(matches!(
            validate("", None),
            Err(Error::InvalidArgument { argument: "name", .. })
        ));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(validate(&long, None).is_err());
        let long_category = "y".repeat(MAX_CATEGORY_LEN + 1);
        assert!(matches!(
            validate("rice", Some(&long_category)),
            Err(Error::InvalidArgument {
                argument: "category",
                ..
            })
        ));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("olive oil"), "olive oil");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[tokio::test]
    async fn test_create_existing_name_conflicts() {
        let Some(pool) = crate::catalog::test_support::test_pool().await else {
            eprintln!("Skipping: DATABASE_URL not set");
            return;
        };

        let name = format!("Saffron {}", crate::catalog::test_support::unique_suffix());
        let first = create(
            &pool,
            &NewIngredient {
                name: name.clone(),
                category: Some("spice".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(first.name, normalize_name(&name));

        // Same name after normalization
        let again = create(
            &pool,
            &NewIngredient {
                name: format!("  {} ", name.to_uppercase()),
                category: None,
            },
        )
        .await;
        assert!(matches!(again, Err(Error::Conflict { .. })));

        let resolved = find_or_create(&pool, &name, None).await.unwrap();
        assert_eq!(resolved.id, first.id);
    }
}
