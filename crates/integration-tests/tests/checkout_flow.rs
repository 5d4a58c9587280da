//! Cart to shipping quote to order total, and pop-up selection for a page.
//!
//! Pure flows over the shared domain types; no database needed.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeDelta, Utc};

use desguace_core::cart::{Cart, CartError, CartLine};
use desguace_core::payment::PaymentProvider;
use desguace_core::shipping::{ShippingError, quote_zone, resolve_zone};
use desguace_core::{
    ButtonAction, DisplayFrequency, PartId, Popup, PopupId, PopupTrigger, PopupType, Price,
    Province, ProvinceId, ShippingMethod, ShippingMethodId, ShippingZoneId, ZoneRate, ZoneRateId,
};

// ============================================================================
// Fixtures
// ============================================================================

fn line(id: i32, euros: i64, grams: i64) -> CartLine {
    CartLine {
        part_id: PartId::new(id),
        quantity: 1,
        unit_price: Price::from_cents(euros * 100),
        part_name: format!("Pieza {id}"),
        part_family: Some("Motor".into()),
        part_image: None,
        part_reference: Some(format!("REF-{id}")),
        part_code: None,
        weight_grams: grams,
        vehicle_id: None,
    }
}

fn method(id: i32, name: &str, free_from_euros: i64) -> ShippingMethod {
    ShippingMethod {
        id: ShippingMethodId::new(id),
        name: name.into(),
        description: None,
        base_price: Price::ZERO,
        free_shipping_threshold: Price::from_cents(free_from_euros * 100),
        weight_based_pricing: false,
        price_per_kg: Price::ZERO,
        max_weight: None,
        estimated_days: None,
        is_active: true,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        updated_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

fn rate(id: i32, method_id: i32, min: i32, max: Option<i32>, cents: i64) -> ZoneRate {
    ZoneRate {
        id: ZoneRateId::new(id),
        zone_id: ShippingZoneId::new(1),
        shipping_method_id: ShippingMethodId::new(method_id),
        min_weight: min,
        max_weight: max,
        price: Price::from_cents(cents),
    }
}

/// Peninsula rates: standard up to 10 kg, urgent in two bands.
fn peninsula_rates() -> Vec<(ZoneRate, ShippingMethod)> {
    let standard = method(1, "Estándar", 100);
    let urgent = method(2, "Urgente", 0);
    vec![
        (rate(1, 1, 0, Some(10_000), 650), standard),
        (rate(2, 2, 0, Some(5_000), 900), urgent.clone()),
        (rate(3, 2, 5_001, Some(20_000), 1_200), urgent),
    ]
}

fn murcia() -> Vec<Province> {
    vec![Province {
        id: ProvinceId::new(30),
        name: "Murcia".into(),
        code: Some("30".into()),
        zone_id: Some(ShippingZoneId::new(1)),
    }]
}

// ============================================================================
// Checkout totals
// ============================================================================

#[test]
fn test_cart_quote_and_total() {
    let mut cart = Cart::default();
    cart.add(line(1, 60, 4_000)).unwrap();
    cart.add(line(2, 30, 1_500)).unwrap();
    assert!(matches!(
        cart.add(line(2, 30, 1_500)),
        Err(CartError::AlreadyInCart(_))
    ));

    let zone = resolve_zone("murcia", &murcia()).unwrap();
    assert_eq!(zone, ShippingZoneId::new(1));

    let options = quote_zone(
        cart.total_weight_grams(),
        cart.subtotal(),
        &peninsula_rates(),
        Some(PaymentProvider::Redsys),
    )
    .unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].name, "Estándar");
    assert_eq!(options[1].cost, Price::from_cents(1_200));

    let total = cart.subtotal() + options[0].cost;
    assert_eq!(total, Price::from_cents(9_650));
}

#[test]
fn test_threshold_makes_standard_free() {
    let mut cart = Cart::default();
    cart.add(line(1, 60, 4_000)).unwrap();
    cart.add(line(2, 30, 1_500)).unwrap();
    cart.add(line(3, 15, 500)).unwrap();

    let options = quote_zone(
        cart.total_weight_grams(),
        cart.subtotal(),
        &peninsula_rates(),
        None,
    )
    .unwrap();
    assert!(options[0].is_free);
    assert_eq!(options[0].cost, Price::ZERO);
    assert_eq!(cart.subtotal() + options[0].cost, Price::from_cents(10_500));

    // Dropping below the threshold brings the charge back
    cart.update_quantity(PartId::new(3), 0).unwrap();
    let options = quote_zone(
        cart.total_weight_grams(),
        cart.subtotal(),
        &peninsula_rates(),
        None,
    )
    .unwrap();
    assert_eq!(options[0].cost, Price::from_cents(650));
}

#[test]
fn test_cash_means_pickup() {
    let mut cart = Cart::default();
    cart.add(line(1, 60, 4_000)).unwrap();
    let options = quote_zone(
        cart.total_weight_grams(),
        cart.subtotal(),
        &peninsula_rates(),
        Some(PaymentProvider::Cash),
    )
    .unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].method_id, None);
    assert_eq!(cart.subtotal() + options[0].cost, cart.subtotal());
}

#[test]
fn test_heavy_or_empty_cart_has_no_quote() {
    let mut cart = Cart::default();
    assert_eq!(
        quote_zone(0, Price::ZERO, &peninsula_rates(), None),
        Err(ShippingError::EmptyCart)
    );
    cart.add(line(1, 400, 25_000)).unwrap();
    assert_eq!(
        quote_zone(
            cart.total_weight_grams(),
            cart.subtotal(),
            &peninsula_rates(),
            None
        ),
        Err(ShippingError::NoMethodsAvailable)
    );
}

// ============================================================================
// Pop-up selection
// ============================================================================

fn popup(id: i32, priority: i32, targets: &[&str], excludes: &[&str]) -> Popup {
    Popup {
        id: PopupId::new(id),
        title: format!("Pop-up {id}"),
        content: String::new(),
        popup_type: PopupType::Promotion,
        trigger_type: PopupTrigger::Immediate,
        trigger_value: 0,
        display_frequency: DisplayFrequency::Once,
        target_pages: targets.iter().map(|s| (*s).to_owned()).collect(),
        exclude_pages: excludes.iter().map(|s| (*s).to_owned()).collect(),
        start_date: None,
        end_date: None,
        is_active: true,
        show_close_button: true,
        button_text: None,
        button_url: None,
        button_action: ButtonAction::Close,
        priority,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        updated_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// Live pop-ups for a page, highest priority first.
fn shown_on(popups: &[Popup], page: &str, now: DateTime<Utc>) -> Vec<i32> {
    let mut live: Vec<&Popup> = popups
        .iter()
        .filter(|p| p.is_live_at(now) && p.targets_page(page))
        .collect();
    live.sort_by_key(|p| std::cmp::Reverse(p.priority));
    live.iter().map(|p| p.id.as_i32()).collect()
}

#[test]
fn test_popups_for_page() {
    let now = Utc::now();
    let mut expired = popup(4, 100, &[], &[]);
    expired.end_date = Some(now - TimeDelta::days(1));
    let mut upcoming = popup(5, 100, &[], &[]);
    upcoming.start_date = Some(now + TimeDelta::days(1));
    let mut off = popup(6, 100, &[], &[]);
    off.is_active = false;

    let popups = vec![
        popup(1, 1, &[], &["/checkout"]),
        popup(2, 10, &["/piezas"], &[]),
        popup(3, 5, &["/"], &[]),
        expired,
        upcoming,
        off,
    ];

    assert_eq!(shown_on(&popups, "/piezas/123", now), vec![2, 3, 1]);
    assert_eq!(shown_on(&popups, "/checkout", now), vec![3]);
}
