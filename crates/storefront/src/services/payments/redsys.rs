//! Redsys TPV (Spanish card gateway).
//!
//! The shopper's browser posts three fields to Redsys:
//! `Ds_SignatureVersion`, `Ds_MerchantParameters` (base64 JSON) and
//! `Ds_Signature`. The signature is HMAC-SHA256 over the encoded parameters
//! under a per-order key: the merchant secret 3DES-encrypts the order
//! reference. Redsys notifies us server-to-server with the same three fields.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD};
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use desguace_core::Price;
use desguace_core::payment::{PaymentOrder, PaymentProvider, PaymentResult};

use super::{
    CallbackData, CallbackOutcome, OrderLookup, PaymentError, PaymentModule, constant_time_compare,
    required_setting, setting,
};

type TdesCbcEnc = cbc::Encryptor<des::TdesEde3>;

pub const SIGNATURE_VERSION: &str = "HMAC_SHA256_V1";
const PRODUCTION_URL: &str = "https://sis.redsys.es/sis/realizarPago";
const TEST_URL: &str = "https://sis-t.redsys.es:25443/sis/realizarPago";
const CURRENCY_EUR: &str = "978";
const TRANSACTION_AUTHORISATION: &str = "0";
const LANGUAGE_SPANISH: &str = "001";
/// Responses `0000..=0099` are authorisations.
const MAX_AUTHORISED_RESPONSE: u16 = 99;

/// Redsys environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    /// Payment form action URL.
    #[must_use]
    pub const fn action_url(self) -> &'static str {
        match self {
            Self::Test => TEST_URL,
            Self::Production => PRODUCTION_URL,
        }
    }
}

/// 12-character Redsys order reference: `YYYYMMDD` plus the last four
/// digits of our order number, zero-padded.
#[must_use]
pub fn redsys_order_number(order_number: &str, now: DateTime<Utc>) -> String {
    let digits: String = order_number.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}{tail:0>4}", now.format("%Y%m%d"))
}

/// Fields posted to Redsys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedsysForm {
    pub action_url: String,
    pub signature_version: &'static str,
    pub merchant_parameters: String,
    pub signature: String,
    pub redsys_order_number: String,
}

/// Redsys payment module.
pub struct RedsysModule {
    merchant_code: String,
    secret_key: SecretString,
    terminal: String,
    environment: Environment,
    base_url: String,
    url_ok: String,
    url_ko: String,
}

impl RedsysModule {
    /// Build from a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidConfig` if a required setting is missing.
    pub fn from_config(config: &Value, base_url: &str) -> Result<Self, PaymentError> {
        let environment = match setting(config, &["environment"]).as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Test,
        };
        Ok(Self {
            merchant_code: required_setting(config, &["merchantCode", "merchant_code"])?,
            secret_key: SecretString::from(required_setting(
                config,
                &["secretKey", "secret_key"],
            )?),
            terminal: setting(config, &["terminal"]).unwrap_or_else(|| "1".to_owned()),
            environment,
            base_url: base_url.to_owned(),
            url_ok: setting(config, &["urlOk", "url_ok"])
                .unwrap_or_else(|| format!("{base_url}/payment/success")),
            url_ko: setting(config, &["urlKo", "url_ko"])
                .unwrap_or_else(|| format!("{base_url}/payment/failure")),
        })
    }

    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Merchant parameters JSON for an order.
    #[must_use]
    pub fn merchant_parameters(&self, order: &PaymentOrder, redsys_order: &str) -> Value {
        json!({
            "DS_MERCHANT_AMOUNT": order.amount.to_cents().to_string(),
            "DS_MERCHANT_ORDER": redsys_order,
            "DS_MERCHANT_MERCHANTCODE": self.merchant_code,
            "DS_MERCHANT_CURRENCY": CURRENCY_EUR,
            "DS_MERCHANT_TRANSACTIONTYPE": TRANSACTION_AUTHORISATION,
            "DS_MERCHANT_TERMINAL": format!("{:0>3}", self.terminal),
            "DS_MERCHANT_MERCHANTURL": format!("{}/api/payment/redsys/callback", self.base_url),
            "DS_MERCHANT_URLOK": self.url_ok,
            "DS_MERCHANT_URLKO": self.url_ko,
            "DS_MERCHANT_CONSUMERLANGUAGE": LANGUAGE_SPANISH,
            "DS_MERCHANT_PRODUCTDESCRIPTION": format!("Compra Desguace Murcia {}", order.order_number),
            "DS_MERCHANT_TITULAR": order.customer_name,
        })
    }

    /// Build the signed form for an order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidConfig` if the secret key is not a valid
    /// base64 3DES key.
    pub fn build_form(
        &self,
        order: &PaymentOrder,
        now: DateTime<Utc>,
    ) -> Result<RedsysForm, PaymentError> {
        let redsys_order = redsys_order_number(&order.order_number, now);
        let params = self.merchant_parameters(order, &redsys_order);
        let encoded = BASE64.encode(params.to_string());
        let signature = sign(self.secret_key.expose_secret(), &redsys_order, &encoded)?;
        Ok(RedsysForm {
            action_url: self.environment.action_url().to_owned(),
            signature_version: SIGNATURE_VERSION,
            merchant_parameters: encoded,
            signature,
            redsys_order_number: redsys_order,
        })
    }

    /// Verify a notification and decode its parameters.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidCallback` for missing or undecodable
    /// fields and `PaymentError::InvalidSignature` if the signature differs.
    pub fn verify_notification(
        &self,
        merchant_parameters: &str,
        signature: &str,
    ) -> Result<Value, PaymentError> {
        let params = decode_parameters(merchant_parameters)?;
        let redsys_order = param_str(&params, "Ds_Order")
            .ok_or_else(|| PaymentError::InvalidCallback("Ds_Order missing".into()))?;
        let expected = sign(self.secret_key.expose_secret(), &redsys_order, merchant_parameters)?;
        if !constant_time_compare(&url_safe(&expected), &url_safe(signature.trim())) {
            warn!(redsys_order = %redsys_order, "Redsys signature mismatch");
            return Err(PaymentError::InvalidSignature);
        }
        Ok(params)
    }
}

impl PaymentModule for RedsysModule {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Redsys
    }

    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentResult, PaymentError> {
        let form = self.build_form(order, Utc::now())?;
        let mut data = serde_json::to_value(&form)
            .map_err(|e| PaymentError::InvalidConfig(e.to_string()))?;
        if let Some(obj) = data.as_object_mut() {
            obj.insert("amount".into(), json!(order.amount.to_cents()));
            obj.insert("orderNumber".into(), json!(order.order_number));
        }
        Ok(PaymentResult {
            success: true,
            transaction_id: None,
            redirect_url: Some(format!(
                "{}/api/payment/redsys/form/{}",
                self.base_url, order.order_id
            )),
            error_message: None,
            data: Some(data),
        })
    }

    #[instrument(skip(self, data))]
    async fn handle_callback(&self, data: &CallbackData) -> Result<CallbackOutcome, PaymentError> {
        let version = data.field("Ds_SignatureVersion").unwrap_or(SIGNATURE_VERSION);
        if version != SIGNATURE_VERSION {
            return Err(PaymentError::InvalidCallback(format!(
                "unsupported signature version {version}"
            )));
        }
        let encoded = data
            .field("Ds_MerchantParameters")
            .ok_or_else(|| PaymentError::InvalidCallback("Ds_MerchantParameters missing".into()))?;
        let signature = data
            .field("Ds_Signature")
            .ok_or_else(|| PaymentError::InvalidCallback("Ds_Signature missing".into()))?;

        let params = self.verify_notification(encoded, signature)?;
        let outcome = outcome_from_params(params);
        debug!(
            authorised = outcome.authorised,
            response = ?outcome.response_code,
            "Redsys notification verified"
        );
        Ok(outcome)
    }

    /// Redsys has no status query in this integration; only signed
    /// notifications confirm a payment.
    async fn verify_transaction(&self, _transaction_id: &str) -> Result<bool, PaymentError> {
        Ok(false)
    }
}

/// Interpret verified notification parameters.
fn outcome_from_params(params: Value) -> CallbackOutcome {
    let response_code = param_str(&params, "Ds_Response");
    let authorised = response_code
        .as_deref()
        .and_then(|c| c.trim().parse::<u16>().ok())
        .is_some_and(|c| c <= MAX_AUTHORISED_RESPONSE);
    let amount = param_str(&params, "Ds_Amount")
        .and_then(|a| a.trim().parse::<i64>().ok())
        .map(Price::from_cents);
    let lookup = param_str(&params, "Ds_Order")
        .map(|o| o.trim().to_owned())
        .filter(|o| !o.is_empty())
        .map(OrderLookup::RedsysOrder);
    let transaction_id = param_str(&params, "Ds_AuthorisationCode")
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty());

    CallbackOutcome {
        lookup,
        authorised,
        transaction_id,
        amount,
        response_code,
        raw: params,
    }
}

/// HMAC-SHA256 signature of `encoded_params` for `redsys_order`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidConfig` if the secret is not base64 or not a
/// 24-byte key.
pub fn sign(secret_b64: &str, redsys_order: &str, encoded_params: &str) -> Result<String, PaymentError> {
    let key = derive_order_key(secret_b64, redsys_order)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| PaymentError::InvalidConfig(e.to_string()))?;
    mac.update(encoded_params.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// 3DES-CBC (zero IV) encryption of the zero-padded order reference.
fn derive_order_key(secret_b64: &str, redsys_order: &str) -> Result<Vec<u8>, PaymentError> {
    let key = BASE64
        .decode(secret_b64.trim())
        .map_err(|_| PaymentError::InvalidConfig("Redsys secret key is not base64".into()))?;
    let cipher = TdesCbcEnc::new_from_slices(&key, &[0u8; 8])
        .map_err(|_| PaymentError::InvalidConfig("Redsys secret key must be 24 bytes".into()))?;

    let mut buf = redsys_order.as_bytes().to_vec();
    let padded_len = buf.len().div_ceil(8).max(1) * 8;
    buf.resize(padded_len, 0);
    let encrypted = cipher
        .encrypt_padded_mut::<NoPadding>(&mut buf, padded_len)
        .map_err(|_| PaymentError::InvalidConfig("Redsys key derivation failed".into()))?;
    Ok(encrypted.to_vec())
}

/// Decode `Ds_MerchantParameters`, accepting standard or URL-safe base64.
fn decode_parameters(encoded: &str) -> Result<Value, PaymentError> {
    let standard = encoded.trim().replace('-', "+").replace('_', "/");
    let bytes = STANDARD_NO_PAD
        .decode(standard.trim_end_matches('='))
        .map_err(|_| PaymentError::InvalidCallback("Ds_MerchantParameters is not base64".into()))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| PaymentError::InvalidCallback("Ds_MerchantParameters is not JSON".into()))
}

/// Parameter lookup, case-insensitive on the key. Numbers are stringified.
fn param_str(params: &Value, key: &str) -> Option<String> {
    let obj = params.as_object()?;
    let value = obj
        .get(key)
        .or_else(|| obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))?;
    match value {
        Value::String(s) => Some(urlencoding::decode(s).map_or_else(|_| s.clone(), |d| d.into_owned())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalise to the URL-safe alphabet Redsys uses in notifications.
fn url_safe(signature: &str) -> String {
    signature.replace('+', "-").replace('/', "_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use desguace_core::OrderId;

    use super::*;

    /// Redsys public test key.
    const TEST_KEY: &str = "sq7HjrUOBfKmC576ILgskD5srU870gJ7";

    fn module() -> RedsysModule {
        RedsysModule::from_config(
            &json!({
                "merchantCode": "999008881",
                "secretKey": TEST_KEY,
                "terminal": "1",
                "environment": "test"
            }),
            "https://tienda.example",
        )
        .unwrap()
    }

    fn order() -> PaymentOrder {
        PaymentOrder {
            order_id: OrderId::new(42),
            order_number: "PED-000042".into(),
            amount: Price::from_cents(12_100),
            currency: "EUR".into(),
            description: "Pedido PED-000042".into(),
            customer_email: "ana@example.com".into(),
            customer_name: "Ana García".into(),
            return_url: String::new(),
            cancel_url: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(redsys_order_number("PED-000042", now()), "202503070042");
        assert_eq!(redsys_order_number("PED-123456", now()), "202503073456");
        assert_eq!(redsys_order_number("7", now()), "202503070007");
        assert_eq!(redsys_order_number("PED-", now()).len(), 12);
    }

    #[test]
    fn test_merchant_parameters() {
        let params = module().merchant_parameters(&order(), "202503070042");
        assert_eq!(params["DS_MERCHANT_AMOUNT"], "12100");
        assert_eq!(params["DS_MERCHANT_TERMINAL"], "001");
        assert_eq!(params["DS_MERCHANT_CURRENCY"], "978");
        assert_eq!(
            params["DS_MERCHANT_MERCHANTURL"],
            "https://tienda.example/api/payment/redsys/callback"
        );
        assert_eq!(params["DS_MERCHANT_URLOK"], "https://tienda.example/payment/success");
    }

    #[test]
    fn test_signature_is_deterministic_and_order_bound() {
        let a = sign(TEST_KEY, "202503070042", "eyJhIjoxfQ==").unwrap();
        let b = sign(TEST_KEY, "202503070042", "eyJhIjoxfQ==").unwrap();
        let c = sign(TEST_KEY, "202503070043", "eyJhIjoxfQ==").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(BASE64.decode(&a).unwrap().len(), 32);
    }

    #[test]
    fn test_bad_key_is_config_error() {
        assert!(matches!(
            sign("not base64!", "202503070042", "x"),
            Err(PaymentError::InvalidConfig(_))
        ));
        assert!(matches!(
            sign("c2hvcnQ=", "202503070042", "x"),
            Err(PaymentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_form_round_trips_through_notification() {
        let m = module();
        let form = m.build_form(&order(), now()).unwrap();
        assert_eq!(form.action_url, TEST_URL);

        // A notification signed the same way, in URL-safe form.
        let notification = BASE64.encode(
            json!({
                "Ds_Order": form.redsys_order_number,
                "Ds_Response": "0000",
                "Ds_Amount": "12100",
                "Ds_AuthorisationCode": "123456"
            })
            .to_string(),
        );
        let signature = url_safe(&sign(TEST_KEY, &form.redsys_order_number, &notification).unwrap());
        let params = m.verify_notification(&notification, &signature).unwrap();

        let outcome = outcome_from_params(params);
        assert!(outcome.authorised);
        assert_eq!(outcome.amount, Some(Price::from_cents(12_100)));
        assert_eq!(outcome.transaction_id.as_deref(), Some("123456"));
        assert_eq!(outcome.lookup, Some(OrderLookup::RedsysOrder("202503070042".into())));
    }

    #[test]
    fn test_tampered_notification_rejected() {
        let m = module();
        let original = BASE64.encode(json!({"Ds_Order": "202503070042", "Ds_Response": "0000"}).to_string());
        let signature = sign(TEST_KEY, "202503070042", &original).unwrap();
        let tampered = BASE64.encode(json!({"Ds_Order": "202503070042", "Ds_Response": "0190"}).to_string());
        assert!(matches!(
            m.verify_notification(&tampered, &signature),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_denied_response_codes() {
        let outcome = outcome_from_params(json!({"Ds_Order": "202503070042", "Ds_Response": "0190"}));
        assert!(!outcome.authorised);
        assert_eq!(outcome.response_code.as_deref(), Some("0190"));
        let outcome = outcome_from_params(json!({"Ds_Order": "202503070042", "Ds_Response": "99"}));
        assert!(outcome.authorised);
    }

    #[test]
    fn test_lookup_carries_full_reference() {
        // PED-000042 and PED-010042 share their last four digits.
        let older = redsys_order_number("PED-000042", now());
        let newer = redsys_order_number("PED-010042", now() + chrono::Duration::days(1));
        assert_ne!(older, newer);

        let outcome = outcome_from_params(json!({"Ds_Order": older, "Ds_Response": "0000"}));
        assert_eq!(outcome.lookup, Some(OrderLookup::RedsysOrder("202503070042".into())));
        let outcome = outcome_from_params(json!({"Ds_Order": " ", "Ds_Response": "0000"}));
        assert_eq!(outcome.lookup, None);
    }
}
