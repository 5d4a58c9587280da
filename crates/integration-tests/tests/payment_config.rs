//! Payment credentials as they travel between the back-office and the shop.
//!
//! The back-office masks secrets on the way out and merges masked values
//! back on save; the storefront only offers methods whose stored config is
//! complete.

use chrono::Utc;
use serde_json::json;

use desguace_core::payment::{
    PaymentProvider, is_configured, mask_secrets, merge_secrets, validate_config,
};
use desguace_core::payment::config::SECRET_MASK;
use desguace_core::{PaymentConfig, PaymentConfigId};

fn stored(provider: PaymentProvider, config: serde_json::Value, active: bool) -> PaymentConfig {
    PaymentConfig {
        id: PaymentConfigId::new(1),
        provider,
        name: provider.display_name().to_owned(),
        is_active: active,
        config,
        sort_order: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn test_masked_edit_keeps_stripe_secret() {
    let original = json!({"publicKey": "pk_live_1", "secretKey": "sk_live_1"});

    // What the back-office form receives
    let shown = mask_secrets(PaymentProvider::Stripe, &original);
    assert_eq!(shown["secretKey"], SECRET_MASK);
    assert_eq!(shown["publicKey"], "pk_live_1");

    // The form is saved with only the public key changed
    let mut edited = shown;
    edited["publicKey"] = json!("pk_live_2");
    let merged = merge_secrets(PaymentProvider::Stripe, edited, &original);

    assert_eq!(merged["secretKey"], "sk_live_1");
    assert_eq!(merged["publicKey"], "pk_live_2");
    assert!(validate_config(PaymentProvider::Stripe, &merged).is_ok());
}

#[test]
fn test_new_secret_replaces_stored() {
    let original = json!({"clientId": "id", "clientSecret": "old", "environment": "sandbox"});
    let edited = json!({"clientId": "id", "clientSecret": "new", "environment": "production"});
    let merged = merge_secrets(PaymentProvider::Paypal, edited, &original);
    assert_eq!(merged["clientSecret"], "new");
    assert!(validate_config(PaymentProvider::Paypal, &merged).is_ok());
}

#[test]
fn test_storefront_offers_only_complete_active_methods() {
    let cash = json!({
        "pickup_location": "Ctra. de Alicante, Murcia",
        "pickup_hours": "L-V 9:00-14:00",
        "contact_phone": "968000000"
    });
    assert!(is_configured(&stored(PaymentProvider::Cash, cash.clone(), true)));
    assert!(!is_configured(&stored(PaymentProvider::Cash, cash, false)));

    let incomplete = json!({"bank_name": "Banco"});
    assert!(!is_configured(&stored(
        PaymentProvider::BankTransfer,
        incomplete,
        true
    )));
}

#[test]
fn test_redsys_accepts_snake_case_aliases() {
    let config = json!({
        "merchant_code": "999008881",
        "secret_key": "sq7HjrUOBfKmC576ILgskD5srU870gJ7",
        "terminal": "1",
        "environment": "test"
    });
    assert!(validate_config(PaymentProvider::Redsys, &config).is_ok());

    let masked = mask_secrets(PaymentProvider::Redsys, &config);
    assert_eq!(masked["secret_key"], SECRET_MASK);
}
