//! Live back-office API tests.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`dsg-cli migrate`)
//! - The admin server running (`cargo run -p desguace-admin`)
//! - `ADMIN_TEST_USERNAME` / `ADMIN_TEST_PASSWORD` for an admin account
//!
//! Run with: cargo test -p desguace-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use desguace_integration_tests::{admin_client, admin_url, session_client};

// ============================================================================
// Health & Auth
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_health() {
    let resp = session_client()
        .get(format!("{}/health", admin_url()))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_routes_require_a_session() {
    let client = session_client();
    for path in [
        "/api/admin/orders",
        "/api/admin/payment-methods",
        "/api/backup/list",
        "/api/import/history",
    ] {
        let resp = client
            .get(format!("{}{path}", admin_url()))
            .send()
            .await
            .expect("Failed to reach admin");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_login_with_wrong_password() {
    let resp = session_client()
        .post(format!("{}/api/admin/auth/login", admin_url()))
        .json(&json!({"username": "nobody", "password": "definitely-wrong"}))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_me_after_login() {
    let client = admin_client().await;
    let me: Value = client
        .get(format!("{}/api/admin/auth/me", admin_url()))
        .send()
        .await
        .expect("Failed to get me")
        .json()
        .await
        .expect("Failed to parse user");
    assert_eq!(me["role"], "admin");
    assert!(me.get("passwordHash").is_none());
}

// ============================================================================
// Orders & Payments
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_order_list_pagination() {
    let client = admin_client().await;
    let page: Value = client
        .get(format!("{}/api/admin/orders?page=1&limit=5", admin_url()))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to parse orders");
    assert_eq!(page["page"], 1);
    assert!(page["orders"].as_array().is_some_and(|o| o.len() <= 5));
    assert!(page["totalPages"].is_number());
}

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_payment_status_rejects_refunded() {
    let client = admin_client().await;
    let resp = client
        .patch(format!("{}/api/admin/orders/1/payment-status", admin_url()))
        .json(&json!({"paymentStatus": "reembolsado"}))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_payment_module_schemas() {
    let client = admin_client().await;
    let modules: Vec<Value> = client
        .get(format!("{}/api/admin/payment-modules", admin_url()))
        .send()
        .await
        .expect("Failed to list modules")
        .json()
        .await
        .expect("Failed to parse modules");
    assert_eq!(modules.len(), 5);

    let report: Value = client
        .post(format!(
            "{}/api/admin/payment-modules/stripe/validate",
            admin_url()
        ))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to validate")
        .json()
        .await
        .expect("Failed to parse report");
    assert_eq!(report["valid"], false);
    assert!(report["errors"].as_array().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_payment_secrets_are_masked() {
    let client = admin_client().await;
    let methods: Vec<Value> = client
        .get(format!("{}/api/admin/payment-methods", admin_url()))
        .send()
        .await
        .expect("Failed to list methods")
        .json()
        .await
        .expect("Failed to parse methods");
    for method in methods.iter().filter(|m| m["provider"] == "stripe") {
        let secret = &method["config"]["secretKey"];
        assert!(secret.is_null() || secret == "********");
    }
}

// ============================================================================
// Backups & Imports
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_backup_rejects_path_traversal() {
    let client = admin_client().await;
    let resp = client
        .get(format!(
            "{}/api/backup/download/..%2F..%2Fetc%2Fpasswd",
            admin_url()
        ))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_schedule_frequency_is_validated() {
    let client = admin_client().await;
    let resp = client
        .post(format!("{}/api/import/schedules", admin_url()))
        .json(&json!({"importType": "parts", "frequency": "500h", "startTime": "02:00"}))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["errors"].as_array().is_some_and(|e| e.len() == 1));
}

#[tokio::test]
#[ignore = "Requires running admin server and test credentials"]
async fn test_import_config_key_is_masked() {
    let client = admin_client().await;
    let config: Value = client
        .get(format!("{}/api/import/config", admin_url()))
        .send()
        .await
        .expect("Failed to get import config")
        .json()
        .await
        .expect("Failed to parse config");
    let key = config["apiKey"].as_str().unwrap_or_default();
    assert!(key.is_empty() || key == "********" || key == "API_KEY_PLACEHOLDER");
}
