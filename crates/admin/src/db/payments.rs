//! Payment module configuration.

use serde_json::Value;
use sqlx::PgPool;

use desguace_core::PaymentConfig;
use desguace_core::PaymentConfigId;
use desguace_core::payment::PaymentProvider;

use super::{RepositoryError, conflict_on_unique, require_affected};

const PAYMENT_CONFIG_COLUMNS: &str =
    "id, provider, name, is_active, config, sort_order, created_at, updated_at";

/// Fields written by create and update. `config` must already have its
/// masked secrets merged back.
#[derive(Debug, Clone)]
pub struct PaymentConfigInput {
    pub provider: PaymentProvider,
    pub name: String,
    pub is_active: bool,
    pub config: Value,
    pub sort_order: i32,
}

/// Repository for `payment_config`.
pub struct PaymentConfigRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentConfigRepository<'a> {
    /// Create a new payment config repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every configured method in display order, secrets included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PaymentConfig>, RepositoryError> {
        let configs = sqlx::query_as::<_, PaymentConfig>(&format!(
            "SELECT {PAYMENT_CONFIG_COLUMNS} FROM payment_config ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(configs)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PaymentConfigId) -> Result<Option<PaymentConfig>, RepositoryError> {
        let config = sqlx::query_as::<_, PaymentConfig>(&format!(
            "SELECT {PAYMENT_CONFIG_COLUMNS} FROM payment_config WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the provider is already configured.
    pub async fn create(&self, input: &PaymentConfigInput) -> Result<PaymentConfig, RepositoryError> {
        sqlx::query_as::<_, PaymentConfig>(&format!(
            "INSERT INTO payment_config (provider, name, is_active, config, sort_order) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PAYMENT_CONFIG_COLUMNS}"
        ))
        .bind(input.provider)
        .bind(&input.name)
        .bind(input.is_active)
        .bind(&input.config)
        .bind(input.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "payment provider"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown config and
    /// `RepositoryError::Conflict` if the provider moves onto a configured one.
    pub async fn update(
        &self,
        id: PaymentConfigId,
        input: &PaymentConfigInput,
    ) -> Result<PaymentConfig, RepositoryError> {
        sqlx::query_as::<_, PaymentConfig>(&format!(
            "UPDATE payment_config SET provider = $2, name = $3, is_active = $4, config = $5, \
             sort_order = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING {PAYMENT_CONFIG_COLUMNS}"
        ))
        .bind(id)
        .bind(input.provider)
        .bind(&input.name)
        .bind(input.is_active)
        .bind(&input.config)
        .bind(input.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "payment provider"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown config.
    pub async fn delete(&self, id: PaymentConfigId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM payment_config WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown config.
    pub async fn set_active(
        &self,
        id: PaymentConfigId,
        active: bool,
    ) -> Result<PaymentConfig, RepositoryError> {
        sqlx::query_as::<_, PaymentConfig>(&format!(
            "UPDATE payment_config SET is_active = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {PAYMENT_CONFIG_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
