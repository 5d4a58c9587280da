//! Live storefront API tests.
//!
//! These tests require a migrated and seeded database (`dsg-cli migrate`,
//! `dsg-cli seed shipping`) and the storefront running
//! (`cargo run -p desguace-storefront`). Cart tests also need at least one
//! part with stock in the catalog.
//!
//! Run with: cargo test -p desguace-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use desguace_integration_tests::{session_client, storefront_url};

fn api(path: &str) -> String {
    format!("{}/api{path}", storefront_url())
}

/// First part in the catalog with stock, if any.
async fn any_part_id(client: &reqwest::Client) -> Option<i64> {
    let page: Value = client
        .get(api("/parts?limit=1"))
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;
    page["data"][0]["id"].as_i64()
}

// ============================================================================
// Health & Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_health() {
    let resp = session_client()
        .get(format!("{}/health", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_parts_are_paginated() {
    let page: Value = session_client()
        .get(api("/parts?limit=3&offset=0"))
        .send()
        .await
        .expect("Failed to list parts")
        .json()
        .await
        .expect("Failed to parse parts");
    assert!(page["data"].as_array().is_some_and(|d| d.len() <= 3));
    assert_eq!(page["pagination"]["limit"], 3);
    assert_eq!(page["pagination"]["offset"], 0);
    assert!(page["pagination"]["hasMore"].is_boolean());
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_unknown_part_is_404() {
    let resp = session_client()
        .get(api("/parts/999999999"))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Shipping
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and seeded provinces"]
async fn test_provinces_are_seeded() {
    let provinces: Vec<Value> = session_client()
        .get(api("/provinces"))
        .send()
        .await
        .expect("Failed to list provinces")
        .json()
        .await
        .expect("Failed to parse provinces");
    assert_eq!(provinces.len(), 52);
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded provinces"]
async fn test_unknown_province_is_rejected() {
    let resp = session_client()
        .post(api("/shipping/calculate"))
        .json(&json!({"province": "Atlántida"}))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_new_session_has_empty_cart() {
    let cart: Value = session_client()
        .get(api("/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["totalItems"], 0);
    assert_eq!(cart["items"], json!([]));
}

#[tokio::test]
#[ignore = "Requires running storefront and a part in stock"]
async fn test_cart_add_and_remove() {
    let client = session_client();
    let Some(part_id) = any_part_id(&client).await else {
        return;
    };

    let cart: Value = client
        .post(api("/cart/items"))
        .json(&json!({"partId": part_id}))
        .send()
        .await
        .expect("Failed to add item")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["totalItems"], 1);

    // Same session, same cart
    let cart: Value = client
        .get(api("/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["items"][0]["partId"], part_id);

    let cart: Value = client
        .delete(api(&format!("/cart/items/{part_id}")))
        .send()
        .await
        .expect("Failed to remove item")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["totalItems"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_new_guest_has_no_orders() {
    let orders: Vec<Value> = session_client()
        .get(api("/orders"))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to parse orders");
    assert!(orders.is_empty());
}
