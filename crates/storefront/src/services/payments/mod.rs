//! Payment modules.
//!
//! Each provider implements [`PaymentModule`]. [`PaymentManager`] builds the
//! module for a provider from its active `payment_config` row and
//! reconciles confirmed payments against orders.
//!
//! Online providers (Redsys, Stripe, PayPal) only mark an order paid after a
//! verified confirmation. Offline providers (bank transfer, cash) record a
//! pending payment and leave confirmation to staff.

mod bank_transfer;
mod cash;
pub mod paypal;
pub mod redsys;
pub mod stripe;

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use desguace_core::payment::{
    FieldKind, PaymentOrder, PaymentProvider, PaymentResult, config_fields, config_str,
    is_configured,
};
use desguace_core::{Order, OrderId, PaymentConfig, Price};

use crate::db::{NewOrderPayment, PaymentRepository, RepositoryError};

pub use bank_transfer::BankTransferModule;
pub use cash::CashModule;
pub use paypal::PaypalModule;
pub use redsys::RedsysModule;
pub use stripe::StripeModule;

/// Errors raised by payment modules.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No active, complete configuration for the provider.
    #[error("payment provider not available: {0}")]
    NotConfigured(PaymentProvider),

    /// Stored configuration cannot be used (bad key encoding, etc).
    #[error("invalid payment configuration: {0}")]
    InvalidConfig(String),

    /// Gateway signature did not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// Callback payload could not be decoded.
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// Gateway returned an error response.
    #[error("gateway error: {status} - {message}")]
    Gateway { status: u16, message: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider does not support this operation.
    #[error("unsupported operation for {0}")]
    Unsupported(PaymentProvider),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Raw callback input as received from a gateway.
#[derive(Debug, Clone, Default)]
pub struct CallbackData {
    /// Form or query fields.
    pub fields: BTreeMap<String, String>,
    /// Unparsed request body, for providers that sign the body.
    pub raw_body: Option<String>,
    /// Provider signature header, if the provider sends one.
    pub signature_header: Option<String>,
}

impl CallbackData {
    /// Field lookup.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// How a callback identifies its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    Id(OrderId),
    /// Full `Ds_Order` reference issued with the Redsys form.
    RedsysOrder(String),
}

/// Verified result of a gateway callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    /// `None` for events that do not concern an order.
    pub lookup: Option<OrderLookup>,
    pub authorised: bool,
    pub transaction_id: Option<String>,
    pub amount: Option<Price>,
    /// Gateway response code, used for failure messages.
    pub response_code: Option<String>,
    /// Decoded payload, stored with the payment.
    pub raw: Value,
}

/// A payment provider integration.
pub trait PaymentModule: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Check a candidate configuration for this provider.
    ///
    /// # Errors
    ///
    /// Returns every problem found as user-facing messages.
    fn validate_config(&self, config: &Value) -> Result<(), Vec<String>> {
        desguace_core::payment::validate_config(self.provider(), config)
    }

    /// Start a payment for an order.
    fn process_payment(
        &self,
        order: &PaymentOrder,
    ) -> impl Future<Output = Result<PaymentResult, PaymentError>> + Send;

    /// Verify and decode an asynchronous notification.
    fn handle_callback(
        &self,
        data: &CallbackData,
    ) -> impl Future<Output = Result<CallbackOutcome, PaymentError>> + Send;

    /// Ask the gateway whether a transaction completed.
    fn verify_transaction(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = Result<bool, PaymentError>> + Send;
}

/// A module built from stored configuration.
pub enum ConfiguredModule {
    Redsys(RedsysModule),
    Stripe(StripeModule),
    Paypal(PaypalModule),
    BankTransfer(BankTransferModule),
    Cash(CashModule),
}

impl PaymentModule for ConfiguredModule {
    fn provider(&self) -> PaymentProvider {
        match self {
            Self::Redsys(m) => m.provider(),
            Self::Stripe(m) => m.provider(),
            Self::Paypal(m) => m.provider(),
            Self::BankTransfer(m) => m.provider(),
            Self::Cash(m) => m.provider(),
        }
    }

    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentResult, PaymentError> {
        match self {
            Self::Redsys(m) => m.process_payment(order).await,
            Self::Stripe(m) => m.process_payment(order).await,
            Self::Paypal(m) => m.process_payment(order).await,
            Self::BankTransfer(m) => m.process_payment(order).await,
            Self::Cash(m) => m.process_payment(order).await,
        }
    }

    async fn handle_callback(&self, data: &CallbackData) -> Result<CallbackOutcome, PaymentError> {
        match self {
            Self::Redsys(m) => m.handle_callback(data).await,
            Self::Stripe(m) => m.handle_callback(data).await,
            Self::Paypal(m) => m.handle_callback(data).await,
            Self::BankTransfer(m) => m.handle_callback(data).await,
            Self::Cash(m) => m.handle_callback(data).await,
        }
    }

    async fn verify_transaction(&self, transaction_id: &str) -> Result<bool, PaymentError> {
        match self {
            Self::Redsys(m) => m.verify_transaction(transaction_id).await,
            Self::Stripe(m) => m.verify_transaction(transaction_id).await,
            Self::Paypal(m) => m.verify_transaction(transaction_id).await,
            Self::BankTransfer(m) => m.verify_transaction(transaction_id).await,
            Self::Cash(m) => m.verify_transaction(transaction_id).await,
        }
    }
}

/// A payment method as listed to shoppers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPaymentMethod {
    pub provider: PaymentProvider,
    pub name: String,
    pub is_online: bool,
    /// Non-secret configuration (bank details, publishable keys, pickup info).
    pub config: BTreeMap<&'static str, String>,
}

impl PublicPaymentMethod {
    /// Strip every password-type field from a stored configuration.
    #[must_use]
    pub fn from_config(config: &PaymentConfig) -> Self {
        let public = config_fields(config.provider)
            .into_iter()
            .filter(|f| f.kind != FieldKind::Password)
            .filter_map(|f| {
                let keys: Vec<&str> = std::iter::once(f.key).chain(f.alias).collect();
                config_str(&config.config, &keys).map(|v| (f.key, v.to_owned()))
            })
            .collect();
        Self {
            provider: config.provider,
            name: config.name.clone(),
            is_online: config.provider.is_online(),
            config: public,
        }
    }
}

/// What a gateway needs to know about a stored order.
#[must_use]
pub fn payment_order(order: &Order, base_url: &str) -> PaymentOrder {
    PaymentOrder {
        order_id: order.id,
        order_number: order.order_number.clone(),
        amount: order.total,
        currency: "EUR".to_owned(),
        description: format!("Pedido {}", order.order_number),
        customer_email: order.customer_email.clone(),
        customer_name: order.customer_name.clone(),
        return_url: format!("{base_url}/payment/success?orderId={}", order.id),
        cancel_url: format!("{base_url}/checkout?cancelled=true"),
    }
}

/// A gateway-confirmed payment to apply to an order.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    /// `card` or `paypal`.
    pub method: &'static str,
    pub transaction_id: Option<String>,
    pub amount: Price,
    pub raw: Value,
}

/// Builds payment modules and applies confirmations.
pub struct PaymentManager<'a> {
    pool: &'a PgPool,
    http: &'a reqwest::Client,
    base_url: &'a str,
}

impl<'a> PaymentManager<'a> {
    /// Create a manager.
    ///
    /// `base_url` is the public storefront URL used for gateway redirects.
    #[must_use]
    pub const fn new(pool: &'a PgPool, http: &'a reqwest::Client, base_url: &'a str) -> Self {
        Self {
            pool,
            http,
            base_url,
        }
    }

    /// Active and complete payment methods, without secrets.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Repository` if the query fails.
    pub async fn available_methods(&self) -> Result<Vec<PublicPaymentMethod>, PaymentError> {
        let configs = PaymentRepository::new(self.pool).active_configs().await?;
        Ok(configs
            .iter()
            .filter(|c| is_configured(c))
            .map(PublicPaymentMethod::from_config)
            .collect())
    }

    async fn load(&self, provider: PaymentProvider) -> Result<PaymentConfig, PaymentError> {
        let config = PaymentRepository::new(self.pool)
            .active_config(provider)
            .await?
            .ok_or(PaymentError::NotConfigured(provider))?;
        if !is_configured(&config) {
            warn!(provider = %provider, "Payment provider active but incomplete");
            return Err(PaymentError::NotConfigured(provider));
        }
        Ok(config)
    }

    /// Build the module for a provider from its active configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` if the provider is inactive or
    /// incomplete, and `PaymentError::InvalidConfig` if it cannot be used.
    pub async fn module_for(
        &self,
        provider: PaymentProvider,
    ) -> Result<ConfiguredModule, PaymentError> {
        let config = self.load(provider).await?;
        let module = match provider {
            PaymentProvider::Redsys => {
                ConfiguredModule::Redsys(RedsysModule::from_config(&config.config, self.base_url)?)
            }
            PaymentProvider::Stripe => ConfiguredModule::Stripe(StripeModule::from_config(
                &config.config,
                self.http.clone(),
            )?),
            PaymentProvider::Paypal => ConfiguredModule::Paypal(PaypalModule::from_config(
                &config.config,
                self.http.clone(),
                self.base_url,
            )?),
            PaymentProvider::BankTransfer => {
                ConfiguredModule::BankTransfer(BankTransferModule::from_config(&config.config))
            }
            PaymentProvider::Cash => ConfiguredModule::Cash(CashModule::from_config(&config.config)),
        };
        Ok(module)
    }

    /// # Errors
    ///
    /// See [`Self::module_for`].
    pub async fn redsys(&self) -> Result<RedsysModule, PaymentError> {
        let config = self.load(PaymentProvider::Redsys).await?;
        RedsysModule::from_config(&config.config, self.base_url)
    }

    /// # Errors
    ///
    /// See [`Self::module_for`].
    pub async fn stripe(&self) -> Result<StripeModule, PaymentError> {
        let config = self.load(PaymentProvider::Stripe).await?;
        StripeModule::from_config(&config.config, self.http.clone())
    }

    /// # Errors
    ///
    /// See [`Self::module_for`].
    pub async fn paypal(&self) -> Result<PaypalModule, PaymentError> {
        let config = self.load(PaymentProvider::Paypal).await?;
        PaypalModule::from_config(&config.config, self.http.clone(), self.base_url)
    }

    /// Mark an order paid.
    ///
    /// Returns `false` if the order had already been paid; nothing is written
    /// in that case.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Repository` if the order does not exist or the
    /// transaction fails.
    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id, provider = %confirmation.provider))]
    pub async fn reconcile(&self, confirmation: Confirmation) -> Result<bool, PaymentError> {
        let payment = NewOrderPayment {
            order_id: confirmation.order_id,
            payment_method: confirmation.method.to_owned(),
            provider: confirmation.provider,
            transaction_id: confirmation.transaction_id,
            amount: confirmation.amount,
            status: "completed".to_owned(),
            gateway_response: Some(confirmation.raw),
        };
        let applied = PaymentRepository::new(self.pool).mark_paid(&payment).await?;
        if applied {
            info!("Order marked as paid");
        } else {
            info!("Order already paid, confirmation ignored");
        }
        Ok(applied)
    }
}

/// Read an optional string setting.
fn setting(config: &Value, keys: &[&str]) -> Option<String> {
    config_str(config, keys).map(str::to_owned)
}

/// Read a required string setting.
fn required_setting(config: &Value, keys: &[&str]) -> Result<String, PaymentError> {
    setting(config, keys).ok_or_else(|| {
        PaymentError::InvalidConfig(format!("missing {}", keys.first().copied().unwrap_or("field")))
    })
}

/// Read a boolean setting stored as a JSON bool or string.
fn flag(config: &Value, keys: &[&str]) -> bool {
    keys.iter().filter_map(|k| config.get(*k)).any(|v| match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim(), "true" | "1" | "on" | "yes"),
        _ => false,
    })
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use desguace_core::PaymentConfigId;

    use super::*;

    #[test]
    fn test_public_method_hides_secrets() {
        let config = PaymentConfig {
            id: PaymentConfigId::new(1),
            provider: PaymentProvider::Stripe,
            name: "Tarjeta".into(),
            is_active: true,
            config: json!({
                "public_key": "pk_test_123",
                "secretKey": "sk_test_456",
                "webhookSecret": "whsec_789"
            }),
            sort_order: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let public = PublicPaymentMethod::from_config(&config);
        assert_eq!(public.config.get("publicKey").map(String::as_str), Some("pk_test_123"));
        assert!(!public.config.contains_key("secretKey"));
        assert!(!public.config.contains_key("webhookSecret"));
        assert!(public.is_online);
    }

    #[test]
    fn test_flag_accepts_strings() {
        assert!(flag(&json!({"auto_approve": true}), &["auto_approve"]));
        assert!(flag(&json!({"autoApprove": "true"}), &["auto_approve", "autoApprove"]));
        assert!(!flag(&json!({"auto_approve": "false"}), &["auto_approve"]));
        assert!(!flag(&json!({}), &["auto_approve"]));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
