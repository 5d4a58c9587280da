//! Per-provider configuration schema and validation.
//!
//! Configuration is stored as free-form JSON. Older rows use snake_case keys
//! and newer ones camelCase, so every lookup accepts both spellings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::Value;

use super::PaymentProvider;

/// Placeholder shown instead of a stored secret.
pub const SECRET_MASK: &str = "********";

/// Input widget for a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Password,
    Select,
    Textarea,
    Checkbox,
}

/// One configuration field as the back-office renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    /// Canonical key written by the back-office.
    pub key: &'static str,
    /// Legacy spelling still accepted when reading.
    #[serde(skip)]
    pub alias: Option<&'static str>,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub options: &'static [&'static str],
}

const fn field(
    key: &'static str,
    alias: Option<&'static str>,
    label: &'static str,
    kind: FieldKind,
    required: bool,
) -> ConfigField {
    ConfigField {
        key,
        alias,
        label,
        kind,
        required,
        options: &[],
    }
}

const REDSYS_ENVIRONMENTS: &[&str] = &["test", "production"];
const PAYPAL_ENVIRONMENTS: &[&str] = &["sandbox", "production"];

/// Field schema for a provider.
#[must_use]
pub fn config_fields(provider: PaymentProvider) -> Vec<ConfigField> {
    use FieldKind::{Checkbox, Password, Select, Text, Textarea};

    match provider {
        PaymentProvider::Redsys => vec![
            field("merchantCode", Some("merchant_code"), "Código de comercio (FUC)", Text, true),
            field("secretKey", Some("secret_key"), "Clave secreta SHA-256", Password, true),
            field("terminal", None, "Terminal", Text, false),
            ConfigField {
                options: REDSYS_ENVIRONMENTS,
                ..field("environment", None, "Entorno", Select, true)
            },
        ],
        PaymentProvider::Stripe => vec![
            field("publicKey", Some("public_key"), "Clave publicable", Text, true),
            field("secretKey", Some("secret_key"), "Clave secreta", Password, true),
            field("webhookSecret", Some("webhook_secret"), "Secreto del webhook", Password, false),
        ],
        PaymentProvider::Paypal => vec![
            field("clientId", Some("client_id"), "Client ID", Text, true),
            field("clientSecret", Some("client_secret"), "Client Secret", Password, true),
            ConfigField {
                options: PAYPAL_ENVIRONMENTS,
                ..field("environment", None, "Entorno", Select, true)
            },
        ],
        PaymentProvider::BankTransfer => vec![
            field("bank_name", Some("bankName"), "Banco", Text, true),
            field("account_number", Some("accountNumber"), "IBAN", Text, true),
            field("account_holder", Some("accountHolder"), "Titular", Text, false),
            field("instructions", None, "Instrucciones", Textarea, false),
            field("auto_approve", Some("autoApprove"), "Aprobar automáticamente", Checkbox, false),
        ],
        PaymentProvider::Cash => vec![
            field("pickup_location", Some("pickupLocation"), "Dirección de recogida", Text, true),
            field("pickup_hours", Some("pickupHours"), "Horario", Text, true),
            field("contact_phone", Some("contactPhone"), "Teléfono", Text, true),
            field("instructions", None, "Instrucciones", Textarea, false),
        ],
    }
}

/// Read a non-empty string under any of `keys`.
#[must_use]
pub fn config_str<'a>(config: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| config.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn field_value<'a>(config: &'a Value, f: &ConfigField) -> Option<&'a str> {
    match f.alias {
        Some(alias) => config_str(config, &[f.key, alias]),
        None => config_str(config, &[f.key]),
    }
}

/// Check that a configuration is complete and well-formed.
///
/// # Errors
///
/// Returns every problem found, as user-facing messages.
pub fn validate_config(provider: PaymentProvider, config: &Value) -> Result<(), Vec<String>> {
    let fields = config_fields(provider);
    let mut errors: Vec<String> = fields
        .iter()
        .filter(|f| f.required && field_value(config, f).is_none())
        .map(|f| format!("{} es obligatorio", f.label))
        .collect();

    for f in fields.iter().filter(|f| !f.options.is_empty()) {
        if let Some(v) = field_value(config, f)
            && !f.options.contains(&v)
        {
            errors.push(format!("{} debe ser uno de: {}", f.label, f.options.join(", ")));
        }
    }

    if provider == PaymentProvider::Redsys {
        if let Some(code) = config_str(config, &["merchantCode", "merchant_code"])
            && !code.chars().all(|c| c.is_ascii_digit())
        {
            errors.push("El código de comercio debe ser numérico".to_owned());
        }
        if let Some(key) = config_str(config, &["secretKey", "secret_key"]) {
            match BASE64.decode(key) {
                Ok(bytes) if bytes.len() == 24 => {}
                _ => errors.push("La clave secreta debe ser una clave Redsys en base64".to_owned()),
            }
        }
        if let Some(terminal) = config_str(config, &["terminal"])
            && (terminal.len() > 3 || !terminal.chars().all(|c| c.is_ascii_digit()))
        {
            errors.push("El terminal debe tener hasta 3 dígitos".to_owned());
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Replace stored secrets with [`SECRET_MASK`] before sending to a client.
#[must_use]
pub fn mask_secrets(provider: PaymentProvider, config: &Value) -> Value {
    let mut masked = config.clone();
    if let Some(obj) = masked.as_object_mut() {
        for f in config_fields(provider)
            .iter()
            .filter(|f| f.kind == FieldKind::Password)
        {
            for key in std::iter::once(f.key).chain(f.alias) {
                if let Some(v) = obj.get_mut(key)
                    && v.as_str().is_some_and(|s| !s.is_empty())
                {
                    *v = Value::String(SECRET_MASK.to_owned());
                }
            }
        }
    }
    masked
}

/// Merge an edited configuration with the stored one: secrets the client
/// sent back masked (or left out) keep their stored value.
#[must_use]
pub fn merge_secrets(provider: PaymentProvider, incoming: Value, stored: &Value) -> Value {
    let mut merged = incoming;
    if let Some(obj) = merged.as_object_mut() {
        for f in config_fields(provider)
            .iter()
            .filter(|f| f.kind == FieldKind::Password)
        {
            let sent = obj.get(f.key).and_then(Value::as_str);
            if sent.is_none() || sent == Some(SECRET_MASK) {
                if let Some(existing) = field_value(stored, f) {
                    obj.insert(f.key.to_owned(), Value::String(existing.to_owned()));
                } else {
                    obj.remove(f.key);
                }
            }
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    const REDSYS_TEST_KEY: &str = "sq7HjrUOBfKmC576ILgskD5srU870gJ7";

    #[test]
    fn test_redsys_valid_with_either_key_style() {
        let camel = json!({
            "merchantCode": "999008881",
            "secretKey": REDSYS_TEST_KEY,
            "terminal": "1",
            "environment": "test"
        });
        assert!(validate_config(PaymentProvider::Redsys, &camel).is_ok());
        let snake = json!({
            "merchant_code": "999008881",
            "secret_key": REDSYS_TEST_KEY,
            "environment": "production"
        });
        assert!(validate_config(PaymentProvider::Redsys, &snake).is_ok());
    }

    #[test]
    fn test_redsys_rejects_bad_values() {
        let config = json!({
            "merchantCode": "ABC",
            "secretKey": "not base64!",
            "terminal": "0001",
            "environment": "staging"
        });
        let errors = validate_config(PaymentProvider::Redsys, &config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_missing_required_fields_are_listed() {
        let errors = validate_config(PaymentProvider::Cash, &json!({"pickup_hours": "9-14"}))
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Dirección de recogida es obligatorio".to_owned(),
                "Teléfono es obligatorio".to_owned()
            ]
        );
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = json!({"clientId": "  ", "clientSecret": "x", "environment": "sandbox"});
        assert!(validate_config(PaymentProvider::Paypal, &config).is_err());
    }

    #[test]
    fn test_mask_and_merge_secrets() {
        let stored = json!({"publicKey": "pk_live_1", "secretKey": "sk_live_2"});
        let masked = mask_secrets(PaymentProvider::Stripe, &stored);
        assert_eq!(masked["publicKey"], "pk_live_1");
        assert_eq!(masked["secretKey"], SECRET_MASK);

        let edited = json!({"publicKey": "pk_live_3", "secretKey": SECRET_MASK});
        let merged = merge_secrets(PaymentProvider::Stripe, edited, &stored);
        assert_eq!(merged["publicKey"], "pk_live_3");
        assert_eq!(merged["secretKey"], "sk_live_2");
    }

    #[test]
    fn test_schema_serializes_type_and_options() {
        let fields = serde_json::to_value(config_fields(PaymentProvider::Paypal)).unwrap();
        assert_eq!(fields[2]["type"], "select");
        assert_eq!(fields[2]["options"], json!(["sandbox", "production"]));
        assert!(fields[0].get("options").is_none());
    }
}
