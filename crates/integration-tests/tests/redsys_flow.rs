//! Redsys round trip: stored config, signed form, signed notification.
//!
//! Uses the public Redsys test key; no database or network needed.

#![allow(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use desguace_core::payment::{PaymentOrder, PaymentProvider, validate_config};
use desguace_core::{OrderId, PaymentConfig, PaymentConfigId, Price};
use desguace_storefront::services::payments::redsys::{RedsysModule, SIGNATURE_VERSION, sign};
use desguace_storefront::services::payments::{
    CallbackData, OrderLookup, PaymentError, PaymentModule, PublicPaymentMethod,
};

const TEST_KEY: &str = "sq7HjrUOBfKmC576ILgskD5srU870gJ7";
const BASE_URL: &str = "https://tienda.example";

fn stored_config() -> Value {
    json!({
        "merchant_code": "999008881",
        "secret_key": TEST_KEY,
        "terminal": "1",
        "environment": "test"
    })
}

fn order() -> PaymentOrder {
    PaymentOrder {
        order_id: OrderId::new(7),
        order_number: "PED-000007".into(),
        amount: Price::from_cents(4_599),
        currency: "EUR".into(),
        description: "Pedido PED-000007".into(),
        customer_email: "luis@example.com".into(),
        customer_name: "Luis Pérez".into(),
        return_url: String::new(),
        cancel_url: String::new(),
    }
}

/// A notification as Redsys would post it back for `redsys_order`.
fn notification(redsys_order: &str, response: &str, key: &str) -> CallbackData {
    let params = BASE64.encode(
        json!({
            "Ds_Order": redsys_order,
            "Ds_Response": response,
            "Ds_Amount": "4599",
            "Ds_AuthorisationCode": "A1B2C3"
        })
        .to_string(),
    );
    let signature = sign(key, redsys_order, &params).unwrap();
    CallbackData {
        fields: [
            ("Ds_SignatureVersion", SIGNATURE_VERSION.to_owned()),
            ("Ds_MerchantParameters", params),
            ("Ds_Signature", signature),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect(),
        ..CallbackData::default()
    }
}

#[test]
fn test_stored_config_is_valid_and_secret_stays_private() {
    assert!(validate_config(PaymentProvider::Redsys, &stored_config()).is_ok());

    let config = PaymentConfig {
        id: PaymentConfigId::new(3),
        provider: PaymentProvider::Redsys,
        name: "Tarjeta".into(),
        is_active: true,
        config: stored_config(),
        sort_order: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let public = PublicPaymentMethod::from_config(&config);
    assert!(public.is_online);
    assert!(!public.config.values().any(|v| v == TEST_KEY));
}

#[tokio::test]
async fn test_authorised_notification_identifies_order() {
    let module = RedsysModule::from_config(&stored_config(), BASE_URL).unwrap();

    let started = module.process_payment(&order()).await.unwrap();
    assert!(started.success);
    assert_eq!(
        started.redirect_url.as_deref(),
        Some("https://tienda.example/api/payment/redsys/form/7")
    );

    let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
    let form = module.build_form(&order(), now).unwrap();
    assert_eq!(form.redsys_order_number, "202506010007");

    let outcome = module
        .handle_callback(&notification(&form.redsys_order_number, "0000", TEST_KEY))
        .await
        .unwrap();
    assert!(outcome.authorised);
    assert_eq!(outcome.amount, Some(order().amount));
    assert_eq!(outcome.transaction_id.as_deref(), Some("A1B2C3"));
    assert_eq!(
        outcome.lookup,
        Some(OrderLookup::RedsysOrder("202506010007".into()))
    );
}

#[tokio::test]
async fn test_denied_notification_is_not_authorised() {
    let module = RedsysModule::from_config(&stored_config(), BASE_URL).unwrap();
    let outcome = module
        .handle_callback(&notification("202506010007", "0184", TEST_KEY))
        .await
        .unwrap();
    assert!(!outcome.authorised);
    assert_eq!(outcome.response_code.as_deref(), Some("0184"));
}

#[tokio::test]
async fn test_notification_signed_with_other_key_is_rejected() {
    let module = RedsysModule::from_config(&stored_config(), BASE_URL).unwrap();
    let other_key = BASE64.encode([7u8; 24]);
    let result = module
        .handle_callback(&notification("202506010007", "0000", &other_key))
        .await;
    assert!(matches!(result, Err(PaymentError::InvalidSignature)));
}
