//! Database operations for the storefront.
//!
//! # Database
//!
//! The storefront and admin servers share one `PostgreSQL` database. The
//! storefront reads the catalogue and CMS content and writes carts, orders,
//! payments, users, pop-up stats and contact messages.
//!
//! ## Tables used here
//!
//! - `users` - Customer accounts (argon2 password hashes)
//! - `tower_sessions.session` - Session storage
//! - `vehicles`, `parts` - Catalogue imported from Metasync
//! - `carts`, `cart_items` - Server-side carts keyed by user or guest token
//! - `orders`, `order_items`, `order_payments`
//! - `payment_config` - Payment module credentials
//! - `shipping_methods`, `shipping_zones`, `provinces`, `shipping_zone_rates`
//! - `pages`, `homepage_blocks`, `footer_blocks`, `site_settings`
//! - `popups`, `popup_stats`, `contact_messages`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p desguace-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod cms;
pub mod contact;
pub mod orders;
pub mod payments;
pub mod popups;
pub mod shipping;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::{CartOwner, CartRepository};
pub use catalog::{CatalogRepository, FeedStats, PartFilter, VehicleFilter};
pub use cms::CmsRepository;
pub use contact::{ContactRepository, NewContactMessage};
pub use orders::{NewOrder, NewOrderItem, OrderRepository};
pub use payments::{NewOrderPayment, PaymentRepository};
pub use popups::{NewPopupStat, PopupRepository};
pub use shipping::ShippingRepository;
pub use users::{NewUser, ProfileUpdate, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Pagination parameters shared by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Default page size for catalogue listings.
    pub const DEFAULT_LIMIT: i64 = 24;
    /// Largest page a client may request.
    pub const MAX_LIMIT: i64 = 100;

    /// Clamp client-supplied values.
    #[must_use]
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(Self::DEFAULT_LIMIT)
                .min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    /// Whether more rows exist after this page.
    #[must_use]
    pub const fn has_more(&self, total: i64) -> bool {
        self.offset + self.limit < total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_limits() {
        assert_eq!(Pagination::new(None, None), Pagination { limit: 24, offset: 0 });
        assert_eq!(Pagination::new(Some(500), Some(-3)), Pagination { limit: 100, offset: 0 });
        assert_eq!(Pagination::new(Some(0), Some(48)), Pagination { limit: 24, offset: 48 });
    }

    #[test]
    fn test_page_has_more() {
        let page = Pagination::new(Some(24), Some(24));
        assert!(page.has_more(49));
        assert!(!page.has_more(48));
    }
}
