//! HTTP API Server
//!
//! REST endpoints for the pantry frontend: recipe suggestions, the recipe and
//! ingredient catalogs, and per-user inventory.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::catalog::{
    ingredients, inventory, recipes, AddedItem, Ingredient, InventoryItem, NewIngredient,
    NewInventoryItem, NewRecipe, PgCatalog, Recipe, RecipeDetail,
};
use crate::config::{ApiConfig, SuggestionConfig, MAX_MISSING_RANGE, SUGGESTION_LIMIT_RANGE};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::matching::{
    IngredientId, MatchQuery, MatchingEngine, RecipeId, RecipeMatch, SuggestionSource, UserId,
};

const RECIPE_LIST_LIMIT: (i64, i64) = (1, 100);
const RECIPE_LIST_DEFAULT: i64 = 20;
const INGREDIENT_LIST_LIMIT: (i64, i64) = (1, 500);
const INGREDIENT_LIST_DEFAULT: i64 = 100;
const INGREDIENT_SEARCH_LIMIT: (i64, i64) = (1, 50);
const INGREDIENT_SEARCH_DEFAULT: i64 = 10;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub engine: MatchingEngine<Arc<dyn SuggestionSource>>,
    pub suggestions: SuggestionConfig,
}

impl AppState {
    /// State whose suggestions read from the same database as the CRUD routes
    pub fn new(db: Database, suggestions: SuggestionConfig) -> Self {
        let source: Arc<dyn SuggestionSource> = Arc::new(PgCatalog::new(db.pool().clone()));
        Self::with_source(db, source, suggestions)
    }

    pub fn with_source(
        db: Database,
        source: Arc<dyn SuggestionSource>,
        suggestions: SuggestionConfig,
    ) -> Self {
        let engine = MatchingEngine::new(source, suggestions.fetch_timeout);
        Self {
            db,
            engine,
            suggestions,
        }
    }
}

/// Query params for the suggestions endpoint
#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub max_missing: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<UserId>,
}

/// Query params for paged listings
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user_id: Option<UserId>,
}

/// Query params for adding to the inventory
#[derive(Debug, Deserialize)]
pub struct AddInventoryParams {
    pub ingredient_id: Option<IngredientId>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub user_id: Option<UserId>,
}

/// Query params for updating an inventory entry
#[derive(Debug, Deserialize)]
pub struct UpdateInventoryParams {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub user_id: Option<UserId>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    /// Open connections in the catalog pool
    pub pool_size: u32,
    /// Idle connections in the catalog pool
    pub pool_idle: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub message: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddedResponse {
    pub message: String,
    #[serde(flatten)]
    pub item: AddedItem,
}

/// Build the application router with its middleware stack
pub fn router(state: Arc<AppState>, api: &ApiConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(api.request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors_layer(&api.cors_origins));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        // Suggestions
        .route("/api/recipes/suggestions", get(suggest_recipes))
        // Recipe catalog
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route("/api/recipes/:id", get(get_recipe))
        // Ingredient catalog
        .route("/api/ingredients", get(list_ingredients).post(create_ingredient))
        .route("/api/ingredients/search", get(search_ingredients))
        // Pantry
        .route("/api/inventory", get(list_inventory).post(add_to_inventory))
        .route(
            "/api/inventory/:ingredient_id",
            put(update_inventory).delete(remove_from_inventory),
        )
        .layer(middleware)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Start the API server, stopping when `shutdown` fires
pub async fn start_server(
    state: Arc<AppState>,
    api: &ApiConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state, api);

    let addr = format!("{}:{}", api.host, api.port);
    info!("🚀 Starting Dinner Tonight API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("API server shutting down");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Parameter handling
// ============================================================================

fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| Error::invalid_argument("query", e.body_text()))
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|e| Error::invalid_argument("body", e.body_text()))
}

fn path_id<T>(path: std::result::Result<Path<T>, PathRejection>) -> Result<T> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::invalid_argument("path", e.body_text()))
}

/// `value` or `default`, rejected unless it lies within `min..=max`
fn bounded(
    argument: &'static str,
    value: Option<i64>,
    default: i64,
    (min, max): (i64, i64),
) -> Result<i64> {
    let value = value.unwrap_or(default);
    if (min..=max).contains(&value) {
        Ok(value)
    } else if max == i64::MAX {
        Err(Error::invalid_argument(
            argument,
            format!("must be at least {}", min),
        ))
    } else {
        Err(Error::invalid_argument(
            argument,
            format!("must be between {} and {}", min, max),
        ))
    }
}

fn widen((min, max): (u32, u32)) -> (i64, i64) {
    (i64::from(min), i64::from(max))
}

fn page(params: &PageParams, default_limit: i64, limit_range: (i64, i64)) -> Result<(i64, i64)> {
    let skip = bounded("skip", params.skip, 0, (0, i64::MAX))?;
    let limit = bounded("limit", params.limit, default_limit, limit_range)?;
    Ok((skip, limit))
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> Json<InfoResponse> {
    Json(InfoResponse {
        message: "Dinner Tonight! API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Health check endpoint; reports degraded when the database is unreachable
async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (status, healthy, database) = match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
        }
    };
    let pool = state.db.stats();

    (
        status,
        Json(HealthResponse {
            status: healthy.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
            pool_size: pool.size,
            pool_idle: pool.idle,
        }),
    )
}

/// Recipes the user can (almost) cook with what is in their pantry
async fn suggest_recipes(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<SuggestionParams>, QueryRejection>,
) -> Result<Json<Vec<RecipeMatch>>> {
    let params = query_params(query)?;
    let defaults = &state.suggestions;

    let max_missing = bounded(
        "max_missing",
        params.max_missing,
        i64::from(defaults.default_max_missing),
        widen(MAX_MISSING_RANGE),
    )?;
    let limit = bounded(
        "limit",
        params.limit,
        i64::from(defaults.default_limit),
        widen(SUGGESTION_LIMIT_RANGE),
    )?;
    let user_id = params.user_id.unwrap_or(defaults.default_user_id);

    let matches = state
        .engine
        .suggest(
            user_id,
            MatchQuery {
                max_missing: max_missing as u32,
                limit: limit as usize,
            },
        )
        .await?;

    Ok(Json(matches))
}

async fn list_recipes(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Vec<Recipe>>> {
    let params = query_params(query)?;
    let (skip, limit) = page(&params, RECIPE_LIST_DEFAULT, RECIPE_LIST_LIMIT)?;
    Ok(Json(recipes::list(state.db.pool(), skip, limit).await?))
}

async fn get_recipe(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<RecipeId>, PathRejection>,
) -> Result<Json<RecipeDetail>> {
    let id = path_id(path)?;
    Ok(Json(recipes::get(state.db.pool(), id).await?))
}

async fn create_recipe(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<NewRecipe>, JsonRejection>,
) -> Result<(StatusCode, Json<RecipeDetail>)> {
    let new = json_body(body)?;
    let detail = recipes::create(state.db.pool(), &new).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Vec<Ingredient>>> {
    let params = query_params(query)?;
    let (skip, limit) = page(&params, INGREDIENT_LIST_DEFAULT, INGREDIENT_LIST_LIMIT)?;
    Ok(Json(ingredients::list(state.db.pool(), skip, limit).await?))
}

async fn create_ingredient(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<NewIngredient>, JsonRejection>,
) -> Result<(StatusCode, Json<Ingredient>)> {
    let new = json_body(body)?;
    let ingredient = ingredients::create(state.db.pool(), &new).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

async fn search_ingredients(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Ingredient>>> {
    let params = query_params(query)?;
    let q = params
        .q
        .ok_or_else(|| Error::invalid_argument("q", "search query is required"))?;
    let limit = bounded(
        "limit",
        params.limit,
        INGREDIENT_SEARCH_DEFAULT,
        INGREDIENT_SEARCH_LIMIT,
    )?;
    Ok(Json(ingredients::search(state.db.pool(), &q, limit).await?))
}

async fn list_inventory(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UserParams>, QueryRejection>,
) -> Result<Json<Vec<InventoryItem>>> {
    let params = query_params(query)?;
    let user_id = params.user_id.unwrap_or(state.suggestions.default_user_id);
    Ok(Json(inventory::list(state.db.pool(), user_id).await?))
}

async fn add_to_inventory(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<AddInventoryParams>, QueryRejection>,
) -> Result<(StatusCode, Json<AddedResponse>)> {
    let params = query_params(query)?;
    let ingredient_id = params
        .ingredient_id
        .ok_or_else(|| Error::invalid_argument("ingredient_id", "is required"))?;
    let user_id = params.user_id.unwrap_or(state.suggestions.default_user_id);

    let item = inventory::add(
        state.db.pool(),
        user_id,
        &NewInventoryItem {
            ingredient_id,
            quantity: params.quantity,
            unit: params.unit,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddedResponse {
            message: "Added to inventory".to_string(),
            item,
        }),
    ))
}

async fn update_inventory(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<IngredientId>, PathRejection>,
    query: std::result::Result<Query<UpdateInventoryParams>, QueryRejection>,
) -> Result<Json<MessageResponse>> {
    let ingredient_id = path_id(path)?;
    let params = query_params(query)?;
    let quantity = params
        .quantity
        .ok_or_else(|| Error::invalid_argument("quantity", "is required"))?;
    let unit = params
        .unit
        .ok_or_else(|| Error::invalid_argument("unit", "is required"))?;
    let user_id = params.user_id.unwrap_or(state.suggestions.default_user_id);

    inventory::update(state.db.pool(), user_id, ingredient_id, quantity, &unit).await?;
    Ok(message("Inventory has been updated."))
}

async fn remove_from_inventory(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<IngredientId>, PathRejection>,
    query: std::result::Result<Query<UserParams>, QueryRejection>,
) -> Result<Json<MessageResponse>> {
    let ingredient_id = path_id(path)?;
    let params = query_params(query)?;
    let user_id = params.user_id.unwrap_or(state.suggestions.default_user_id);

    inventory::remove(state.db.pool(), user_id, ingredient_id).await?;
    Ok(message("Removed from inventory"))
}
