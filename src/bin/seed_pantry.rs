//! Seed the database with starter ingredients, one recipe and a pantry
//!
//! Safe to run repeatedly: existing ingredients, the sample recipe and pantry
//! rows are left untouched.

use std::collections::HashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dinner_tonight::catalog::{
    ingredients, inventory, recipes, Ingredient, NewInventoryItem, NewRecipe, NewRecipeIngredient,
};
use dinner_tonight::database::{self, Database};
use dinner_tonight::{Config, Error};

const STARTER_INGREDIENTS: &[(&str, &str)] = &[
    ("chicken breast", "protein"),
    ("rice", "grain"),
    ("broccoli", "vegetable"),
    ("tomato", "vegetable"),
    ("pasta", "grain"),
    ("olive oil", "fat"),
    ("garlic", "vegetable"),
    ("onion", "vegetable"),
    ("salt", "seasoning"),
    ("pepper", "seasoning"),
];

const SAMPLE_RECIPE: &str = "Simple Chicken and Rice";

/// (ingredient, quantity, unit, notes)
const SAMPLE_REQUIREMENTS: &[(&str, f64, &str, Option<&str>)] = &[
    ("chicken breast", 1.5, "lb", Some("diced")),
    ("rice", 2.0, "cups", None),
    ("broccoli", 2.0, "cups", Some("chopped")),
    ("olive oil", 2.0, "tbsp", None),
];

/// (ingredient, quantity, unit)
const STARTER_PANTRY: &[(&str, Option<f64>, Option<&str>)] = &[
    ("chicken breast", Some(2.0), Some("lb")),
    ("rice", Some(5.0), Some("cups")),
    ("olive oil", Some(1.0), Some("cup")),
    ("salt", None, None),
    ("pepper", None, None),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::connect(&config.database).await?;
    database::run_migrations(db.pool()).await?;
    let pool = db.pool();

    info!("🌱 Seeding starter ingredients...");
    let mut by_name: HashMap<&str, Ingredient> = HashMap::new();
    for &(name, category) in STARTER_INGREDIENTS {
        let ingredient = ingredients::find_or_create(pool, name, Some(category)).await?;
        by_name.insert(name, ingredient);
    }
    info!("  ✓ {} ingredients", by_name.len());

    let lookup = |name: &str| -> anyhow::Result<i32> {
        by_name
            .get(name)
            .map(|i| i.id)
            .ok_or_else(|| anyhow::anyhow!("starter ingredient '{}' missing", name))
    };

    if recipes::exists_by_name(pool, SAMPLE_RECIPE).await? {
        info!("  ✓ {} already exists", SAMPLE_RECIPE);
    } else {
        let mut requirements = Vec::with_capacity(SAMPLE_REQUIREMENTS.len());
        for &(name, quantity, unit, notes) in SAMPLE_REQUIREMENTS {
            requirements.push(NewRecipeIngredient {
                ingredient_id: lookup(name)?,
                quantity: Some(quantity),
                unit: Some(unit.to_string()),
                notes: notes.map(str::to_string),
            });
        }

        let recipe = recipes::create(
            pool,
            &NewRecipe {
                name: SAMPLE_RECIPE.to_string(),
                description: Some("A quick and easy chicken and rice dinner".to_string()),
                instructions: Some(
                    "1. Cook rice according to package directions\n\
                     2. Season and cook chicken\n\
                     3. Steam broccoli\n\
                     4. Serve together"
                        .to_string(),
                ),
                cooking_time: Some(30),
                servings: Some(4),
                ingredients: requirements,
            },
        )
        .await?;
        info!("  ✓ Created recipe {} ({})", recipe.recipe.name, recipe.recipe.id);
    }

    let user_id = config.suggestions.default_user_id;
    info!("🧺 Stocking pantry for user {}...", user_id);
    for &(name, quantity, unit) in STARTER_PANTRY {
        let item = NewInventoryItem {
            ingredient_id: lookup(name)?,
            quantity,
            unit: unit.map(str::to_string),
        };
        match inventory::add(pool, user_id, &item).await {
            Ok(_) => info!("  ✓ Added {}", name),
            Err(Error::Conflict { .. }) => info!("  ✓ {} already in inventory", name),
            Err(e) => return Err(e.into()),
        }
    }

    db.close().await;
    info!("✅ Database seeded");
    Ok(())
}
