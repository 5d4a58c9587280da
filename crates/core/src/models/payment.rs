//! Stored configuration for a payment module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payment::PaymentProvider;
use crate::types::PaymentConfigId;

/// One configured payment method. `config` holds provider-specific keys,
/// including secrets; mask them before sending the row to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfig {
    pub id: PaymentConfigId,
    pub provider: PaymentProvider,
    pub name: String,
    pub is_active: bool,
    pub config: serde_json::Value,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
