//! Database operations for the back-office.
//!
//! # Database
//!
//! The admin server shares the storefront's `PostgreSQL` database and owns
//! every write the storefront does not make: staff users, order handling,
//! CMS content, payment modules, shipping tables and the Metasync import.
//!
//! ## Tables written here
//!
//! - `users` - Accounts of every role
//! - `orders`, `parts` (withdrawn on payment), `vehicles` (part counts)
//! - `pages`, `homepage_blocks`, `footer_blocks`, `site_settings`
//! - `popups`, `contact_messages`
//! - `payment_config`
//! - `shipping_methods`, `shipping_zones`, `provinces`, `shipping_zone_rates`
//! - `api_config`, `import_schedules`, `import_history`, `sync_control`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p desguace-cli -- migrate
//! ```

pub mod cms;
pub mod contact;
pub mod imports;
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

pub use cms::{CmsRepository, FooterBlockInput, HomepageBlockInput, PageInput};
pub use contact::ContactRepository;
pub use imports::{CatalogWriter, ImportProgress, ImportRepository, SyncPosition, UpsertOutcome};
pub use orders::{AdminInfoUpdate, OrderFilter, OrderRepository, OrderStatRow};
pub use payments::{PaymentConfigInput, PaymentConfigRepository};
pub use popups::{PopupInput, PopupRepository, PopupStatCounts};
pub use shipping::{ShippingMethodInput, ShippingRepository, ZoneInput, ZoneRateInput};
pub use users::{NewUser, UserFilter, UserRepository, UserUpdate};

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

    /// Constraint violation (e.g., duplicate slug).
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

/// `NotFound` when an UPDATE or DELETE touched nothing.
pub(crate) const fn require_affected(rows: u64) -> Result<(), RepositoryError> {
    if rows == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// The back-office is used by a handful of staff, so the pool is small.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Serde default for flags that start enabled.
pub(crate) const fn default_true() -> bool {
    true
}

/// Pagination parameters shared by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Default page size for back-office tables.
    pub const DEFAULT_LIMIT: i64 = 20;
    /// Largest page a client may request.
    pub const MAX_LIMIT: i64 = 200;

    /// Build from 1-based page numbers as the back-office tables send them.
    #[must_use]
    pub fn from_page(page: Option<i64>, limit: Option<i64>) -> Self {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT);
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub const fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_page_clamps() {
        assert_eq!(Pagination::from_page(None, None), Pagination { limit: 20, offset: 0 });
        assert_eq!(Pagination::from_page(Some(3), Some(50)), Pagination { limit: 50, offset: 100 });
        assert_eq!(Pagination::from_page(Some(-1), Some(1000)), Pagination { limit: 200, offset: 0 });
    }

    #[test]
    fn test_total_pages() {
        let page = Pagination::from_page(Some(1), Some(20));
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(20), 1);
        assert_eq!(page.total_pages(21), 2);
    }
}
