//! Database migrations.
//!
//! Both servers share one database; the migrations live with the
//! storefront crate.
//!
//! # Usage
//!
//! ```bash
//! dsg-cli migrate
//! ```

use desguace_admin::db;
use tracing::info;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
