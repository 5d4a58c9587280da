//! PayPal Orders v2 (create, approve, capture).

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use desguace_core::Price;
use desguace_core::payment::{PaymentOrder, PaymentProvider, PaymentResult};

use super::{
    CallbackData, CallbackOutcome, PaymentError, PaymentModule, required_setting, setting,
};

const SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const PRODUCTION_URL: &str = "https://api-m.paypal.com";

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    #[serde(default)]
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    amount: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: String,
}

/// A created PayPal order awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub paypal_order_id: String,
    pub approve_url: Option<String>,
}

/// Result of capturing an approved order.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub status: String,
    pub capture_id: Option<String>,
    pub amount: Option<Price>,
    pub raw: Value,
}

impl CaptureResult {
    #[must_use]
    pub fn completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// PayPal payment module.
pub struct PaypalModule {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    api_base: &'static str,
    site_base: String,
}

impl PaypalModule {
    /// Build from a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidConfig` if the credentials are missing.
    pub fn from_config(
        config: &Value,
        client: reqwest::Client,
        site_base: &str,
    ) -> Result<Self, PaymentError> {
        let api_base = match setting(config, &["environment"]).as_deref() {
            Some("production") => PRODUCTION_URL,
            _ => SANDBOX_URL,
        };
        Ok(Self {
            client,
            client_id: required_setting(config, &["clientId", "client_id"])?,
            client_secret: SecretString::from(required_setting(
                config,
                &["clientSecret", "client_secret"],
            )?),
            api_base,
            site_base: site_base.to_owned(),
        })
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: AccessToken = parse(response).await?;
        Ok(token.access_token)
    }

    /// Create an order for the buyer to approve.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` or `PaymentError::Http` on failure.
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn create_order(&self, order: &PaymentOrder) -> Result<CreatedOrder, PaymentError> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order.order_number,
                "description": order.description,
                "amount": {
                    "currency_code": "EUR",
                    "value": format!("{:.2}", order.amount.rounded().amount()),
                },
            }],
            "application_context": {
                "return_url": format!("{}/checkout/paypal/return?orderId={}", self.site_base, order.order_id),
                "cancel_url": format!("{}/api/paypal/cancel?orderId={}", self.site_base, order.order_id),
                "brand_name": "Desguace Murcia",
                "user_action": "PAY_NOW",
            },
        });
        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: OrderResponse = parse(response).await?;
        debug!(paypal_order_id = %created.id, "PayPal order created");
        Ok(CreatedOrder {
            approve_url: created
                .links
                .into_iter()
                .find(|l| l.rel == "approve" || l.rel == "payer-action")
                .map(|l| l.href),
            paypal_order_id: created.id,
        })
    }

    /// Capture an approved order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` or `PaymentError::Http` on failure.
    #[instrument(skip(self))]
    pub async fn capture_order(&self, paypal_order_id: &str) -> Result<CaptureResult, PaymentError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.api_base,
                urlencoding::encode(paypal_order_id)
            ))
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await?;
        let raw: Value = parse(response).await?;
        capture_from_value(raw)
    }
}

fn capture_from_value(raw: Value) -> Result<CaptureResult, PaymentError> {
    let parsed: OrderResponse = serde_json::from_value(raw.clone())
        .map_err(|e| PaymentError::InvalidCallback(e.to_string()))?;
    let capture = parsed
        .purchase_units
        .into_iter()
        .filter_map(|u| u.payments)
        .flat_map(|p| p.captures)
        .next();
    let amount = capture
        .as_ref()
        .and_then(|c| c.amount.as_ref())
        .and_then(|a| Price::parse_amount(&a.value).ok());
    Ok(CaptureResult {
        status: parsed.status,
        capture_id: capture.map(|c| c.id),
        amount,
        raw,
    })
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

impl PaymentModule for PaypalModule {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paypal
    }

    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentResult, PaymentError> {
        let created = self.create_order(order).await?;
        Ok(PaymentResult {
            success: true,
            transaction_id: Some(created.paypal_order_id.clone()),
            redirect_url: created.approve_url.clone(),
            error_message: None,
            data: Some(json!({
                "paypalOrderId": created.paypal_order_id,
                "approveUrl": created.approve_url,
            })),
        })
    }

    /// Captures are confirmed synchronously; PayPal webhooks are not used.
    async fn handle_callback(&self, _data: &CallbackData) -> Result<CallbackOutcome, PaymentError> {
        Err(PaymentError::Unsupported(PaymentProvider::Paypal))
    }

    async fn verify_transaction(&self, transaction_id: &str) -> Result<bool, PaymentError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!(
                "{}/v2/checkout/orders/{}",
                self.api_base,
                urlencoding::encode(transaction_id)
            ))
            .bearer_auth(token)
            .send()
            .await?;
        let order: OrderResponse = parse(response).await?;
        Ok(order.status == "COMPLETED")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_parsing() {
        let result = capture_from_value(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "PED-000042",
                "payments": {"captures": [{
                    "id": "3C679366HH908993F",
                    "status": "COMPLETED",
                    "amount": {"currency_code": "EUR", "value": "121.00"}
                }]}
            }]
        }))
        .unwrap();
        assert!(result.completed());
        assert_eq!(result.capture_id.as_deref(), Some("3C679366HH908993F"));
        assert_eq!(result.amount, Some(Price::from_cents(12_100)));
    }

    #[test]
    fn test_capture_without_payments() {
        let result = capture_from_value(json!({"id": "X", "status": "PAYER_ACTION_REQUIRED"})).unwrap();
        assert!(!result.completed());
        assert_eq!(result.capture_id, None);
    }

    #[test]
    fn test_environment_selects_api() {
        let client = reqwest::Client::new();
        let live = PaypalModule::from_config(
            &json!({"clientId": "id", "clientSecret": "secret", "environment": "production"}),
            client.clone(),
            "https://tienda.example",
        )
        .unwrap();
        assert_eq!(live.api_base, PRODUCTION_URL);
        let sandbox = PaypalModule::from_config(
            &json!({"client_id": "id", "client_secret": "secret"}),
            client,
            "https://tienda.example",
        )
        .unwrap();
        assert_eq!(sandbox.api_base, SANDBOX_URL);
    }
}
