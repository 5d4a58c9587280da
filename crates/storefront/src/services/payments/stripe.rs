//! Stripe Payment Intents.
//!
//! The client confirms the card with Stripe.js using the intent's client
//! secret; we then either retrieve the intent or receive the
//! `payment_intent.succeeded` webhook.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{debug, instrument};

use desguace_core::payment::{PaymentOrder, PaymentProvider, PaymentResult};
use desguace_core::{OrderId, Price};

use super::{
    CallbackData, CallbackOutcome, OrderLookup, PaymentError, PaymentModule, constant_time_compare,
    required_setting, setting,
};

/// Stripe API base URL.
const BASE_URL: &str = "https://api.stripe.com/v1";

/// Webhook timestamps older than this are rejected.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// The subset of a `PaymentIntent` we use.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl PaymentIntent {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    /// Our order id, from `metadata.order_id`.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        match self.metadata.get("order_id")? {
            Value::String(s) => s.parse::<i32>().ok().map(OrderId::new),
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()).map(OrderId::new),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: Value,
}

/// Stripe payment module.
pub struct StripeModule {
    client: reqwest::Client,
    public_key: String,
    secret_key: SecretString,
    webhook_secret: Option<SecretString>,
}

impl StripeModule {
    /// Build from a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidConfig` if a required key is missing.
    pub fn from_config(config: &Value, client: reqwest::Client) -> Result<Self, PaymentError> {
        Ok(Self {
            client,
            public_key: required_setting(config, &["publicKey", "public_key"])?,
            secret_key: SecretString::from(required_setting(
                config,
                &["secretKey", "secret_key"],
            )?),
            webhook_secret: setting(config, &["webhookSecret", "webhook_secret"])
                .map(SecretString::from),
        })
    }

    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Create a payment intent for an order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` or `PaymentError::Http` on failure.
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn create_intent(&self, order: &PaymentOrder) -> Result<PaymentIntent, PaymentError> {
        let form = [
            ("amount", order.amount.to_cents().to_string()),
            ("currency", "eur".to_owned()),
            ("description", order.description.clone()),
            ("receipt_email", order.customer_email.clone()),
            ("metadata[order_id]", order.order_id.to_string()),
            ("metadata[order_number]", order.order_number.clone()),
            ("automatic_payment_methods[enabled]", "true".to_owned()),
        ];
        let response = self
            .client
            .post(format!("{BASE_URL}/payment_intents"))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;
        let intent: PaymentIntent = Self::parse(response).await?;
        debug!(intent_id = %intent.id, "Stripe payment intent created");
        Ok(intent)
    }

    /// Retrieve a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` or `PaymentError::Http` on failure.
    #[instrument(skip(self))]
    pub async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .get(format!(
                "{BASE_URL}/payment_intents/{}",
                urlencoding::encode(intent_id)
            ))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Verify a `Stripe-Signature` header against the raw body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if no `v1` signature matches
    /// or the timestamp is outside the tolerance, and
    /// `PaymentError::InvalidConfig` if no webhook secret is configured.
    pub fn verify_webhook(&self, header: &str, body: &str, now: i64) -> Result<(), PaymentError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or_else(|| PaymentError::InvalidConfig("Stripe webhook secret not set".into()))?;
        verify_signature(secret.expose_secret(), header, body, now)
    }
}

/// Stripe webhook signature check: HMAC-SHA256 of `"{t}.{body}"`.
fn verify_signature(secret: &str, header: &str, body: &str, now: i64) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse().ok(),
            Some(("v1", sig)) => candidates.push(sig),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidConfig(e.to_string()))?;
    mac.update(format!("{timestamp}.{body}").as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if candidates.iter().any(|c| constant_time_compare(&expected, c)) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

impl PaymentModule for StripeModule {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentResult, PaymentError> {
        let intent = self.create_intent(order).await?;
        Ok(PaymentResult {
            success: true,
            transaction_id: Some(intent.id.clone()),
            redirect_url: None,
            error_message: None,
            data: Some(json!({
                "clientSecret": intent.client_secret,
                "publishableKey": self.public_key,
                "paymentIntentId": intent.id,
            })),
        })
    }

    async fn handle_callback(&self, data: &CallbackData) -> Result<CallbackOutcome, PaymentError> {
        let body = data
            .raw_body
            .as_deref()
            .ok_or_else(|| PaymentError::InvalidCallback("empty body".into()))?;
        let header = data
            .signature_header
            .as_deref()
            .ok_or(PaymentError::InvalidSignature)?;
        self.verify_webhook(header, body, chrono::Utc::now().timestamp())?;

        let event: WebhookEvent = serde_json::from_str(body)
            .map_err(|e| PaymentError::InvalidCallback(e.to_string()))?;
        if event.event_type != "payment_intent.succeeded" {
            return Ok(CallbackOutcome {
                lookup: None,
                authorised: false,
                transaction_id: None,
                amount: None,
                response_code: Some(event.event_type),
                raw: event.data.object,
            });
        }

        let intent: PaymentIntent = serde_json::from_value(event.data.object.clone())
            .map_err(|e| PaymentError::InvalidCallback(e.to_string()))?;
        Ok(CallbackOutcome {
            lookup: intent.order_id().map(OrderLookup::Id),
            authorised: intent.succeeded(),
            transaction_id: Some(intent.id.clone()),
            amount: Some(Price::from_cents(intent.amount)),
            response_code: Some(intent.status),
            raw: event.data.object,
        })
    }

    async fn verify_transaction(&self, transaction_id: &str) -> Result<bool, PaymentError> {
        Ok(self.retrieve_intent(transaction_id).await?.succeeded())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signed_header(secret: &str, t: i64, body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{t}.{body}").as_bytes());
        format!("t={t},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_webhook_signature_valid() {
        let body = r#"{"type":"payment_intent.succeeded"}"#;
        let header = signed_header("whsec_test", 1_700_000_000, body);
        assert!(verify_signature("whsec_test", &header, body, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_webhook_signature_tolerance() {
        let body = "{}";
        let header = signed_header("whsec_test", 1_700_000_000, body);
        assert!(matches!(
            verify_signature("whsec_test", &header, body, 1_700_000_000 + WEBHOOK_TOLERANCE_SECS + 1),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_webhook_signature_wrong_secret_or_body() {
        let header = signed_header("whsec_test", 1_700_000_000, "{}");
        assert!(verify_signature("whsec_other", &header, "{}", 1_700_000_000).is_err());
        assert!(verify_signature("whsec_test", &header, "{ }", 1_700_000_000).is_err());
        assert!(verify_signature("whsec_test", "v1=abc", "{}", 1_700_000_000).is_err());
    }

    #[test]
    fn test_intent_order_id_from_metadata() {
        let intent: PaymentIntent = serde_json::from_value(json!({
            "id": "pi_123",
            "status": "succeeded",
            "amount": 12100,
            "metadata": {"order_id": "42"}
        }))
        .unwrap();
        assert_eq!(intent.order_id(), Some(OrderId::new(42)));
        assert!(intent.succeeded());
    }
}
