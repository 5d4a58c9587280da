//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::services::{BackupService, EmailService, ImportService};

/// Timeout for outbound calls outside the Metasync client's own.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    email: Option<EmailService>,
    backups: BackupService,
    imports: ImportService,
}

/// Errors building the state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl AppState {
    /// Create a new application state.
    ///
    /// Without SMTP settings, notification emails are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or SMTP transport cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("desguace-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let email = match &config.email {
            Some(email_config) => Some(EmailService::new(email_config)?),
            None => {
                tracing::warn!("SMTP not configured, notification emails disabled");
                None
            }
        };
        let backups = BackupService::new(config.backup_dir.clone(), config.database_url.clone());
        let imports = ImportService::new(pool.clone(), http, config.metasync_api_url.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                backups,
                imports,
            }),
        })
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    #[must_use]
    pub fn backups(&self) -> &BackupService {
        &self.inner.backups
    }

    #[must_use]
    pub fn imports(&self) -> &ImportService {
        &self.inner.imports
    }
}
