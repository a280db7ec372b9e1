mod helpers;

use axum::http::{Method, StatusCode};
use serde_json::json;

use helpers::{send, send_json, test_app, MemorySource};

const CHICKEN: i32 = 1;
const RICE: i32 = 2;
const BROCCOLI: i32 = 3;
const TOMATO: i32 = 4;
const PASTA: i32 = 5;
const OLIVE_OIL: i32 = 6;
const GARLIC: i32 = 7;
const ONION: i32 = 8;

fn kitchen() -> MemorySource {
    MemorySource::default()
        .with_recipe(
            1,
            "Simple Chicken and Rice",
            &[
                (CHICKEN, "chicken breast"),
                (RICE, "rice"),
                (BROCCOLI, "broccoli"),
                (OLIVE_OIL, "olive oil"),
            ],
        )
        .with_recipe(
            2,
            "Garlic Pasta",
            &[(PASTA, "pasta"), (GARLIC, "garlic"), (OLIVE_OIL, "olive oil")],
        )
        .with_recipe(
            3,
            "Tomato Soup",
            &[(TOMATO, "tomato"), (ONION, "onion"), (GARLIC, "garlic")],
        )
        .with_pantry(1, &[CHICKEN, RICE, OLIVE_OIL])
        .with_pantry(2, &[PASTA, GARLIC, OLIVE_OIL, TOMATO])
}

#[tokio::test]
async fn suggestions_rank_default_pantry() {
    let response = send(test_app(kitchen()), Method::GET, "/api/recipes/suggestions").await;

    assert_eq!(response.status, StatusCode::OK);
    let matches = response.body.as_array().expect("array of matches");
    // Tomato Soup misses all three and the default max_missing is 2
    assert_eq!(matches.len(), 2);

    assert_eq!(matches[0]["id"], 1);
    assert_eq!(matches[0]["total_ingredients"], 4);
    assert_eq!(matches[0]["matched_ingredients"], 3);
    assert_eq!(matches[0]["missing_count"], 1);
    assert_eq!(matches[0]["match_percent"], 75);
    assert_eq!(matches[0]["missing_ingredients"], json!(["broccoli"]));
    assert_eq!(matches[0]["cooking_time"], 30);

    assert_eq!(matches[1]["id"], 2);
    assert_eq!(matches[1]["match_percent"], 33);
    assert_eq!(matches[1]["missing_ingredients"], json!(["pasta", "garlic"]));
}

#[tokio::test]
async fn suggestions_honor_user_and_bounds() {
    let response = send(
        test_app(kitchen()),
        Method::GET,
        "/api/recipes/suggestions?user_id=2&max_missing=0&limit=5",
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let matches = response.body.as_array().expect("array of matches");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["name"], "Garlic Pasta");
    assert_eq!(matches[0]["match_percent"], 100);
    assert_eq!(matches[0]["missing_ingredients"], json!([]));
}

#[tokio::test]
async fn suggestions_limit_truncates_after_ranking() {
    let response = send(
        test_app(kitchen()),
        Method::GET,
        "/api/recipes/suggestions?user_id=2&max_missing=5&limit=2",
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let ids: Vec<i64> = response
        .body
        .as_array()
        .expect("array of matches")
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    // Garlic Pasta 100%, Tomato Soup 67%, Chicken and Rice 25%
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn suggestions_for_empty_pantry_within_tolerance() {
    let response = send(
        test_app(kitchen()),
        Method::GET,
        "/api/recipes/suggestions?user_id=99&max_missing=3",
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let matches = response.body.as_array().expect("array of matches");
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m["match_percent"] == 0));
    // Equal percent and missing count fall back to ascending id
    assert_eq!(matches[0]["id"], 2);
    assert_eq!(matches[1]["id"], 3);
}

#[tokio::test]
async fn suggestions_reject_out_of_range_parameters() {
    for uri in [
        "/api/recipes/suggestions?max_missing=6",
        "/api/recipes/suggestions?max_missing=-1",
        "/api/recipes/suggestions?limit=0",
        "/api/recipes/suggestions?limit=51",
    ] {
        let response = send(test_app(kitchen()), Method::GET, uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response.body["error"]["code"], "INVALID_ARGUMENT", "{}", uri);
    }
}

#[tokio::test]
async fn suggestions_reject_malformed_parameters() {
    let response = send(
        test_app(kitchen()),
        Method::GET,
        "/api/recipes/suggestions?max_missing=lots",
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn suggestions_surface_unavailable_data() {
    let response = send(
        test_app(MemorySource::unavailable()),
        Method::GET,
        "/api/recipes/suggestions",
    )
    .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["error"]["code"], "DATA_UNAVAILABLE");
}

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let response = send(test_app(kitchen()), Method::GET, "/health").await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "degraded");
    assert_eq!(response.body["database"], "unavailable");
    assert_eq!(response.body["version"], env!("CARGO_PKG_VERSION"));
    // The lazy pool never managed to open a connection
    assert_eq!(response.body["pool_size"], 0);
    assert_eq!(response.body["pool_idle"], 0);
}

#[tokio::test]
async fn root_describes_api() {
    let response = send(test_app(kitchen()), Method::GET, "/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Dinner Tonight! API");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let response = send(test_app(kitchen()), Method::GET, "/").await;
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn catalog_routes_validate_before_touching_database() {
    let cases = [
        (Method::GET, "/api/recipes?limit=101"),
        (Method::GET, "/api/recipes?skip=-1"),
        (Method::GET, "/api/recipes/not-a-number"),
        (Method::GET, "/api/ingredients?limit=501"),
        (Method::GET, "/api/ingredients/search"),
        (Method::GET, "/api/ingredients/search?q=rice&limit=51"),
        (Method::POST, "/api/inventory"),
        (Method::PUT, "/api/inventory/1?unit=cups"),
        (Method::PUT, "/api/inventory/1?quantity=2"),
    ];

    for (method, uri) in cases {
        let response = send(test_app(kitchen()), method.clone(), uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert_eq!(response.body["error"]["code"], "INVALID_ARGUMENT", "{} {}", method, uri);
    }
}

#[tokio::test]
async fn create_recipe_rejects_invalid_body() {
    let response = send_json(
        test_app(kitchen()),
        Method::POST,
        "/api/recipes",
        Some(json!({ "name": "   ", "ingredients": [] })),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send_json(
        test_app(kitchen()),
        Method::POST,
        "/api/recipes",
        Some(json!({ "description": "no name" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], "INVALID_ARGUMENT");
}
