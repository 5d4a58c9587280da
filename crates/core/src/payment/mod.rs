//! Payment providers, their configuration rules and gateway failure codes.
//!
//! The I/O side (signing, HTTP calls, callbacks) lives in the storefront;
//! this module holds what both servers need to agree on.

pub mod config;
pub mod failure;

use serde::{Deserialize, Serialize};

use crate::models::PaymentConfig;
use crate::types::status::wire_enum;
use crate::types::{OrderId, Price};

pub use config::{
    ConfigField, FieldKind, config_fields, config_str, mask_secrets, merge_secrets, validate_config,
};
pub use failure::{failure_message, failure_solution, is_user_cancellation};

wire_enum! {
    /// A supported payment module.
    PaymentProvider, "payment_provider", "payment provider" {
        /// Card payments through the Redsys TPV.
        Redsys => "redsys",
        Stripe => "stripe",
        Paypal => "paypal",
        BankTransfer => "bank_transfer",
        /// Pay on in-store pickup.
        Cash => "cash",
    }
}

impl PaymentProvider {
    /// Default display name for a new configuration.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Redsys => "Tarjeta (Redsys)",
            Self::Stripe => "Tarjeta (Stripe)",
            Self::Paypal => "PayPal",
            Self::BankTransfer => "Transferencia bancaria",
            Self::Cash => "Pago en tienda",
        }
    }

    /// Whether payment is confirmed by the gateway rather than by staff.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        matches!(self, Self::Redsys | Self::Stripe | Self::Paypal)
    }
}

/// Whether a stored configuration is active and complete.
#[must_use]
pub fn is_configured(config: &PaymentConfig) -> bool {
    config.is_active && validate_config(config.provider, &config.config).is_ok()
}

/// What a payment module needs to start a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub amount: Price,
    pub currency: String,
    pub description: String,
    pub customer_email: String,
    pub customer_name: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// Outcome of starting or confirming a payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub redirect_url: Option<String>,
    pub error_message: Option<String>,
    /// Provider-specific payload for the client (form fields, bank details).
    pub data: Option<serde_json::Value>,
}

impl PaymentResult {
    /// A failed result with a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;
    use crate::types::PaymentConfigId;

    fn stored(provider: PaymentProvider, active: bool, config: serde_json::Value) -> PaymentConfig {
        PaymentConfig {
            id: PaymentConfigId::new(1),
            provider,
            name: provider.display_name().into(),
            is_active: active,
            config,
            sort_order: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_is_configured_requires_active_and_valid() {
        let bank = json!({"bank_name": "Caja Rural", "account_number": "ES00 0000"});
        assert!(is_configured(&stored(PaymentProvider::BankTransfer, true, bank.clone())));
        assert!(!is_configured(&stored(PaymentProvider::BankTransfer, false, bank)));
        assert!(!is_configured(&stored(
            PaymentProvider::BankTransfer,
            true,
            json!({"bank_name": "Caja Rural"})
        )));
    }

    #[test]
    fn test_provider_wire_names() {
        assert_eq!(PaymentProvider::BankTransfer.as_str(), "bank_transfer");
        assert_eq!("paypal".parse::<PaymentProvider>().unwrap(), PaymentProvider::Paypal);
        assert!(PaymentProvider::Redsys.is_online());
        assert!(!PaymentProvider::Cash.is_online());
    }

    #[test]
    fn test_failure_result() {
        let result = PaymentResult::failure("Tarjeta caducada");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Tarjeta caducada"));
    }
}
