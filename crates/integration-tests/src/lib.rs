//! Integration tests for Desguace Murcia.
//!
//! # Running Tests
//!
//! ```bash
//! # Pure cross-crate tests
//! cargo test -p desguace-integration-tests
//!
//! # Live API tests against running servers and a migrated database
//! cargo test -p desguace-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` - Storefront base URL (default: <http://localhost:3000>)
//! - `ADMIN_URL` - Back-office base URL (default: <http://localhost:3001>)
//! - `ADMIN_TEST_USERNAME`, `ADMIN_TEST_PASSWORD` - A staff account with the
//!   admin role, for example one made with `dsg-cli admin create`

use reqwest::{Client, StatusCode};
use serde_json::json;

/// Base URL for the storefront API.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL for the back-office API.
#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A back-office client logged in with the test admin account.
///
/// # Panics
///
/// Panics if the credentials are missing or the login is rejected.
pub async fn admin_client() -> Client {
    let username =
        std::env::var("ADMIN_TEST_USERNAME").expect("ADMIN_TEST_USERNAME must be set");
    let password =
        std::env::var("ADMIN_TEST_PASSWORD").expect("ADMIN_TEST_PASSWORD must be set");

    let client = session_client();
    let resp = client
        .post(format!("{}/api/admin/auth/login", admin_url()))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to reach admin login");
    assert_eq!(resp.status(), StatusCode::OK, "admin login failed");
    client
}
