//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Health check
//! GET  /health/ready                        - Database readiness
//!
//! # Catalog
//! GET  /api/parts                           - Filtered, paginated parts
//! GET  /api/parts/{id}                      - Part detail
//! GET  /api/parts/by-ref/{ref_local}        - Part by Metasync reference
//! GET  /api/vehicles                        - Filtered, paginated vehicles
//! GET  /api/vehicles/{id}                   - Vehicle with its parts
//! GET  /api/filters/brands|models|families|years|fuels
//! GET  /api/search-parts?q=                 - Free-text search
//!
//! # Cart
//! GET    /api/cart                          - Cart summary
//! DELETE /api/cart                          - Empty the cart
//! POST   /api/cart/items                    - Add a part
//! PATCH  /api/cart/items/{partId}           - Set quantity (0 or 1)
//! DELETE /api/cart/items/{partId}           - Remove a part
//!
//! # Shipping
//! GET  /api/shipping/methods                - Active methods
//! POST /api/shipping/calculate              - Quote for a province
//! GET  /api/provinces                       - Provinces with zones
//!
//! # Orders and payments
//! POST /api/orders/local                    - Checkout
//! GET  /api/orders                          - Orders of the shopper
//! GET  /api/orders/{id}                     - Owned order with items
//! GET  /api/payment-methods                 - Enabled payment modules
//! GET  /api/payment/failure-info?code=      - Redsys failure explanation
//! GET  /api/payment/redsys/form/{orderId}   - Auto-submitting TPV form
//! POST /api/payment/redsys/callback         - Redsys notification
//! GET  /api/payment/redsys/return           - Redsys browser return
//! POST /api/payment/stripe/create-intent    - Start a card payment
//! POST /api/payment/stripe/confirm          - Confirm a card payment
//! POST /api/payment/stripe/webhook          - Stripe events
//! POST /api/paypal/create-order             - Start a PayPal payment
//! POST /api/paypal/capture-order            - Capture an approved payment
//! GET  /api/paypal/cancel                   - Buyer cancelled at PayPal
//!
//! # Auth (rate limited)
//! POST /api/auth/register | login | logout
//! GET  /api/auth/me
//!
//! # Customer panel
//! GET|PUT /api/user/profile
//! PUT     /api/user/password
//! GET     /api/user/permissions
//!
//! # Content
//! GET  /api/cms/pages/{slug}
//! GET  /api/cms/homepage-blocks | footer-blocks | settings
//! GET  /api/site-config                     - Maintenance switch
//! GET  /api/popups/active?page=
//! POST /api/popups/{id}/stats
//! POST /api/contact                         - Contact form (rate limited)
//! POST /api/vehicle-valuation               - Valuation form (rate limited)
//!
//! # Feeds
//! GET  /feed/google-merchant.xml
//! GET  /feed/google-merchant/stats
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod cms;
pub mod contact;
pub mod feed;
pub mod orders;
pub mod payments;
pub mod popups;
pub mod shipping;
pub mod user;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::{auth_rate_limiter, form_rate_limiter};
use crate::state::AppState;

/// Parts, vehicles and filter values.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/parts", get(catalog::list_parts))
        .route("/parts/{id}", get(catalog::show_part))
        .route("/parts/by-ref/{ref_local}", get(catalog::part_by_ref))
        .route("/vehicles", get(catalog::list_vehicles))
        .route("/vehicles/{id}", get(catalog::show_vehicle))
        .route("/filters/brands", get(catalog::brands))
        .route("/filters/models", get(catalog::models))
        .route("/filters/families", get(catalog::families))
        .route("/filters/years", get(catalog::years))
        .route("/filters/fuels", get(catalog::fuels))
        .route("/search-parts", get(catalog::search_parts))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{part_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
}

pub fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/shipping/methods", get(shipping::methods))
        .route("/shipping/calculate", post(shipping::calculate))
        .route("/provinces", get(shipping::provinces))
}

/// Checkout, order history and the payment gateways.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/local", post(orders::create_local))
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/payment-methods", get(payments::methods))
        .route("/payment/failure-info", get(payments::failure_info))
        .route("/payment/redsys/form/{order_id}", get(payments::redsys_form))
        .route("/payment/redsys/callback", post(payments::redsys_callback))
        .route("/payment/redsys/return", get(payments::redsys_return))
        .route(
            "/payment/stripe/create-intent",
            post(payments::stripe_create_intent),
        )
        .route("/payment/stripe/confirm", post(payments::stripe_confirm))
        .route("/payment/stripe/webhook", post(payments::stripe_webhook))
        .route("/paypal/create-order", post(payments::paypal_create_order))
        .route("/paypal/capture-order", post(payments::paypal_capture_order))
        .route("/paypal/cancel", get(payments::paypal_cancel))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(auth_rate_limiter())
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(user::profile).put(user::update_profile))
        .route("/password", put(user::change_password))
        .route("/permissions", get(user::permissions))
}

/// Public CMS content, pop-ups and the site switch.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/cms/pages/{slug}", get(cms::page))
        .route("/cms/homepage-blocks", get(cms::homepage_blocks))
        .route("/cms/footer-blocks", get(cms::footer_blocks))
        .route("/cms/settings", get(cms::settings))
        .route("/site-config", get(cms::site_config))
        .route("/popups/active", get(popups::active))
        .route("/popups/{id}/stats", post(popups::record_stat))
}

/// Contact and valuation forms.
pub fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/contact", post(contact::contact))
        .route("/vehicle-valuation", post(contact::vehicle_valuation))
        .layer(form_rate_limiter())
}

pub fn feed_routes() -> Router<AppState> {
    Router::new()
        .route("/google-merchant.xml", get(feed::google_merchant))
        .route("/google-merchant/stats", get(feed::stats))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .merge(shipping_routes())
        .merge(order_routes())
        .nest("/auth", auth_routes())
        .nest("/user", user_routes())
        .merge(content_routes())
        .merge(form_routes());

    Router::new()
        .nest("/api", api)
        .nest("/feed", feed_routes())
}
