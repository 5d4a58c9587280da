//! SQL backups from the command line, written where the back-office
//! keeps them.
//!
//! # Environment Variables
//!
//! - `BACKUP_DIR` - Backup directory (default: backups)

use std::path::PathBuf;

use secrecy::SecretString;
use tracing::info;

use desguace_admin::db;
use desguace_admin::services::BackupService;

const DEFAULT_BACKUP_DIR: &str = "backups";

fn service(database_url: SecretString) -> BackupService {
    let dir = std::env::var("BACKUP_DIR").unwrap_or_else(|_| DEFAULT_BACKUP_DIR.to_owned());
    BackupService::new(PathBuf::from(dir), database_url)
}

/// Dump the database to a new backup file.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the file cannot be
/// written.
pub async fn create() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let backups = service(database_url);

    let backup = backups.create(&pool).await?;
    info!("Backup written: {} ({})", backup.filename, backup.size_formatted);
    Ok(())
}

/// List backups, newest first.
///
/// # Errors
///
/// Returns an error if the backup directory cannot be read.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let backups = service(super::database_url()?).list().await?;
    if backups.is_empty() {
        info!("No backups found");
    }
    for backup in backups {
        info!(
            "{}  {:>10}  {}",
            backup.id,
            backup.size_formatted,
            backup.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
