//! HTTP route handlers for the back-office.
//!
//! Every route except login requires a manager or admin session; the
//! handlers check it through their extractors.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Health check
//! GET  /health/ready                             - Database readiness
//!
//! # Auth (rate limited)
//! POST /api/admin/auth/login | logout
//! GET  /api/admin/auth/me
//!
//! # Users (admin only)
//! GET|POST       /api/admin/users
//! GET|PUT|DELETE /api/admin/users/{id}
//! PUT            /api/admin/users/{id}/password
//!
//! # Orders
//! GET    /api/admin/orders                       - Filtered, paginated
//! GET    /api/admin/orders/stats                 - Last 30 days
//! GET    /api/admin/orders/trash                 - Soft-deleted orders
//! GET    /api/admin/orders/{id}                  - Order with items and payments
//! DELETE /api/admin/orders/{id}                  - Move to trash
//! PATCH  /api/admin/orders/{id}/restore
//! DELETE /api/admin/orders/{id}/permanent        - Admin only
//! PATCH  /api/admin/orders/{id}/payment-status
//! PATCH  /api/admin/orders/{id}/order-status
//! PATCH  /api/admin/orders/{id}/update-admin-info
//!
//! # CMS
//! GET|POST       /api/admin/cms/pages
//! GET|PUT|DELETE /api/admin/cms/pages/{id}
//! GET|POST       /api/admin/cms/homepage-blocks
//! PUT            /api/admin/cms/homepage-blocks/reorder
//! PUT|DELETE     /api/admin/cms/homepage-blocks/{id}
//! GET|POST       /api/admin/cms/footer-blocks
//! PUT|DELETE     /api/admin/cms/footer-blocks/{id}
//! GET|PUT        /api/admin/cms/settings
//! PUT            /api/admin/site-config
//!
//! # Pop-ups
//! GET|POST       /api/admin/popups
//! GET            /api/admin/popups/stats
//! GET|PUT|DELETE /api/admin/popups/{id}
//! PATCH          /api/admin/popups/{id}/toggle
//! GET            /api/admin/popups/{id}/stats
//!
//! # Payments
//! GET|POST       /api/admin/payment-methods
//! PUT|DELETE     /api/admin/payment-methods/{id}
//! PATCH          /api/admin/payment-methods/{id}/toggle
//! GET            /api/admin/payment-modules
//! GET            /api/admin/payment-modules/{provider}
//! POST           /api/admin/payment-modules/{provider}/validate
//!
//! # Shipping
//! GET|POST       /api/admin/shipping/methods
//! GET|PUT|DELETE /api/admin/shipping/methods/{id}
//! GET|POST       /api/admin/shipping/zones
//! PUT|DELETE     /api/admin/shipping/zones/{id}
//! GET|POST       /api/admin/shipping/zones/{id}/rates
//! PUT|DELETE     /api/admin/shipping/rates/{id}
//! GET            /api/admin/shipping/provinces
//! PUT            /api/admin/shipping/provinces/{id}/zone
//! POST           /api/admin/shipping/quote
//!
//! # Contact inbox
//! GET    /api/admin/contact-messages?formType=&status=
//! GET    /api/admin/contact-messages/unread-count
//! PATCH  /api/admin/contact-messages/{id}/status
//! POST   /api/admin/contact-messages/{id}/reply
//! DELETE /api/admin/contact-messages/{id}
//!
//! # Backups (admin only)
//! POST   /api/backup/create
//! GET    /api/backup/list
//! GET    /api/backup/download/{id}
//! POST   /api/backup/restore/{id}
//! DELETE /api/backup/{id}
//!
//! # Imports
//! GET|PUT         /api/import/config
//! POST            /api/import/run
//! GET             /api/import/history?limit=
//! GET             /api/import/history/{id}
//! POST            /api/import/history/{id}/cancel
//! GET|POST        /api/import/schedules
//! PUT|DELETE      /api/import/schedules/{id}
//! ```

pub mod auth;
pub mod backup;
pub mod cms;
pub mod contact;
pub mod import;
pub mod orders;
pub mod payments;
pub mod popups;
pub mod shipping;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::middleware::login_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(login_rate_limiter())
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list).post(users::create))
        .route(
            "/{id}",
            get(users::show).put(users::update).delete(users::delete),
        )
        .route("/{id}/password", put(users::set_password))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/stats", get(orders::stats))
        .route("/trash", get(orders::trash))
        .route("/{id}", get(orders::show).delete(orders::soft_delete))
        .route("/{id}/restore", patch(orders::restore))
        .route("/{id}/permanent", delete(orders::delete_permanently))
        .route("/{id}/payment-status", patch(orders::update_payment_status))
        .route("/{id}/order-status", patch(orders::update_order_status))
        .route("/{id}/update-admin-info", patch(orders::update_admin_info))
}

/// Pages, homepage and footer blocks, and settings.
pub fn cms_routes() -> Router<AppState> {
    Router::new()
        .route("/pages", get(cms::pages).post(cms::create_page))
        .route(
            "/pages/{id}",
            get(cms::page).put(cms::update_page).delete(cms::delete_page),
        )
        .route(
            "/homepage-blocks",
            get(cms::homepage_blocks).post(cms::create_homepage_block),
        )
        .route("/homepage-blocks/reorder", put(cms::reorder_homepage_blocks))
        .route(
            "/homepage-blocks/{id}",
            put(cms::update_homepage_block).delete(cms::delete_homepage_block),
        )
        .route(
            "/footer-blocks",
            get(cms::footer_blocks).post(cms::create_footer_block),
        )
        .route(
            "/footer-blocks/{id}",
            put(cms::update_footer_block).delete(cms::delete_footer_block),
        )
        .route("/settings", get(cms::settings).put(cms::update_settings))
}

pub fn popup_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(popups::list).post(popups::create))
        .route("/stats", get(popups::all_stats))
        .route(
            "/{id}",
            get(popups::show).put(popups::update).delete(popups::delete),
        )
        .route("/{id}/toggle", patch(popups::toggle))
        .route("/{id}/stats", get(popups::stats))
}

/// Payment method configs and the provider schemas.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payment-methods",
            get(payments::list).post(payments::create),
        )
        .route(
            "/payment-methods/{id}",
            put(payments::update).delete(payments::delete),
        )
        .route("/payment-methods/{id}/toggle", patch(payments::toggle))
        .route("/payment-modules", get(payments::modules))
        .route("/payment-modules/{provider}", get(payments::module))
        .route(
            "/payment-modules/{provider}/validate",
            post(payments::validate),
        )
}

pub fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/methods",
            get(shipping::methods).post(shipping::create_method),
        )
        .route(
            "/methods/{id}",
            get(shipping::method)
                .put(shipping::update_method)
                .delete(shipping::delete_method),
        )
        .route("/zones", get(shipping::zones).post(shipping::create_zone))
        .route(
            "/zones/{id}",
            put(shipping::update_zone).delete(shipping::delete_zone),
        )
        .route(
            "/zones/{id}/rates",
            get(shipping::zone_rates).post(shipping::create_rate),
        )
        .route(
            "/rates/{id}",
            put(shipping::update_rate).delete(shipping::delete_rate),
        )
        .route("/provinces", get(shipping::provinces))
        .route("/provinces/{id}/zone", put(shipping::set_province_zone))
        .route("/quote", post(shipping::quote))
}

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(contact::list))
        .route("/unread-count", get(contact::unread_count))
        .route("/{id}", delete(contact::delete))
        .route("/{id}/status", patch(contact::set_status))
        .route("/{id}/reply", post(contact::reply))
}

/// Create the backup routes router.
pub fn backup_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(backup::create))
        .route("/list", get(backup::list))
        .route("/download/{id}", get(backup::download))
        .route("/restore/{id}", post(backup::restore))
        .route("/{id}", delete(backup::delete))
}

/// Metasync credentials, runs, history and schedules.
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/config", get(import::config).put(import::update_config))
        .route("/run", post(import::run))
        .route("/history", get(import::history))
        .route("/history/{id}", get(import::history_entry))
        .route("/history/{id}/cancel", post(import::cancel))
        .route(
            "/schedules",
            get(import::schedules).post(import::create_schedule),
        )
        .route(
            "/schedules/{id}",
            put(import::update_schedule).delete(import::delete_schedule),
        )
}

/// Create all routes for the back-office.
pub fn routes() -> Router<AppState> {
    let admin = Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/orders", order_routes())
        .nest("/cms", cms_routes())
        .route("/site-config", put(cms::update_site_config))
        .nest("/popups", popup_routes())
        .merge(payment_routes())
        .nest("/shipping", shipping_routes())
        .nest("/contact-messages", contact_routes());

    Router::new()
        .nest("/api/admin", admin)
        .nest("/api/backup", backup_routes())
        .nest("/api/import", import_routes())
}
