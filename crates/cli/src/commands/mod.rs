//! `dsg-cli` subcommands.

pub mod admin;
pub mod backup;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Database URL from `ADMIN_DATABASE_URL`, falling back to `DATABASE_URL`
/// like the back-office does. Loads `.env` first.
pub(crate) fn database_url() -> Result<SecretString, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "ADMIN_DATABASE_URL or DATABASE_URL must be set".into())
}
