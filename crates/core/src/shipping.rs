//! Shipping quotes.
//!
//! Two pricing schemes coexist:
//! - Zone rates: each province belongs to a zone, and each method has
//!   weight bands (grams) with a fixed price per zone.
//! - Legacy method pricing, used for methods without any zone rate: the
//!   RODES carrier table, a base-plus-per-kg formula, or a flat price.
//!
//! Both honour the method's free-shipping threshold.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Province, ShippingMethod, ZoneRate};
use crate::payment::PaymentProvider;
use crate::types::{Price, ShippingMethodId, ShippingZoneId};

/// Name shown for in-store pickup when paying cash.
pub const PICKUP_OPTION_NAME: &str = "Recogida en tienda";

/// Errors returned when no quote can be produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingError {
    #[error("Provincia no encontrada")]
    ProvinceNotFound,
    #[error("Provincia no asignada a ninguna zona de envío")]
    ProvinceWithoutZone,
    #[error("No hay métodos de envío disponibles para esta zona y peso")]
    NoMethodsAvailable,
    #[error("El carrito está vacío")]
    EmptyCart,
}

/// One selectable shipping option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    /// `None` for in-store pickup.
    pub method_id: Option<ShippingMethodId>,
    pub name: String,
    pub cost: Price,
    pub estimated_days: Option<String>,
    pub is_free: bool,
}

/// Resolve the shipping zone of a province by case-insensitive name.
///
/// # Errors
///
/// Returns [`ShippingError::ProvinceNotFound`] if no province matches and
/// [`ShippingError::ProvinceWithoutZone`] if it has no zone.
pub fn resolve_zone(name: &str, provinces: &[Province]) -> Result<ShippingZoneId, ShippingError> {
    let wanted = name.trim().to_lowercase();
    let province = provinces
        .iter()
        .find(|p| p.name.to_lowercase() == wanted)
        .ok_or(ShippingError::ProvinceNotFound)?;
    province.zone_id.ok_or(ShippingError::ProvinceWithoutZone)
}

fn rate_applies(rate: &ZoneRate, weight_grams: i64) -> bool {
    i64::from(rate.min_weight) <= weight_grams
        && rate.max_weight.is_none_or(|max| weight_grams <= i64::from(max))
}

fn free_by_threshold(method: &ShippingMethod, subtotal: Price) -> bool {
    method.free_shipping_threshold.is_positive() && subtotal >= method.free_shipping_threshold
}

/// Quote every method that has a matching zone rate.
///
/// `rates` are the zone's rates joined with their methods, in the order they
/// should be considered; only the first matching band per method counts.
/// Paying cash means in-store pickup, which is a single free option.
///
/// # Errors
///
/// Returns [`ShippingError::EmptyCart`] for zero weight and
/// [`ShippingError::NoMethodsAvailable`] when nothing matches.
pub fn quote_zone(
    weight_grams: i64,
    subtotal: Price,
    rates: &[(ZoneRate, ShippingMethod)],
    payment: Option<PaymentProvider>,
) -> Result<Vec<ShippingOption>, ShippingError> {
    if weight_grams <= 0 {
        return Err(ShippingError::EmptyCart);
    }
    if payment == Some(PaymentProvider::Cash) {
        return Ok(vec![pickup_option()]);
    }

    let mut seen: Vec<ShippingMethodId> = Vec::new();
    let mut options = Vec::new();
    for (rate, method) in rates {
        if !method.is_active || seen.contains(&method.id) || !rate_applies(rate, weight_grams) {
            continue;
        }
        seen.push(method.id);
        let is_free = free_by_threshold(method, subtotal);
        options.push(ShippingOption {
            method_id: Some(method.id),
            name: method.name.clone(),
            cost: if is_free { Price::ZERO } else { rate.price },
            estimated_days: method.estimated_days.clone(),
            is_free,
        });
    }

    if options.is_empty() {
        return Err(ShippingError::NoMethodsAvailable);
    }
    options.sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.name.cmp(&b.name)));
    Ok(options)
}

/// The zero-cost pickup option offered to cash payers.
#[must_use]
pub fn pickup_option() -> ShippingOption {
    ShippingOption {
        method_id: None,
        name: PICKUP_OPTION_NAME.to_owned(),
        cost: Price::ZERO,
        estimated_days: None,
        is_free: true,
    }
}

/// RODES carrier bands: (upper bound in kg, inclusive; price in cents).
const RODES_RATES: &[(i64, i64)] = &[
    (1, 350),
    (3, 400),
    (5, 450),
    (10, 550),
    (15, 700),
    (20, 850),
    (30, 1_050),
    (40, 1_300),
    (50, 1_550),
    (75, 2_100),
    (100, 2_700),
    (150, 3_800),
    (200, 4_900),
    (500, 9_100),
];

fn rodes_cost(weight_kg: Decimal) -> Price {
    RODES_RATES
        .iter()
        .find(|(max_kg, _)| weight_kg <= Decimal::from(*max_kg))
        .or_else(|| RODES_RATES.last())
        .map_or(Price::ZERO, |(_, cents)| Price::from_cents(*cents))
}

/// Cost of a method without zone rates. `None` if the method cannot carry
/// the weight.
#[must_use]
pub fn legacy_cost(method: &ShippingMethod, weight_grams: i64, subtotal: Price) -> Option<Price> {
    let weight_kg = Decimal::new(weight_grams, 3);
    if method.max_weight.is_some_and(|max| weight_kg > max) {
        return None;
    }
    if free_by_threshold(method, subtotal) {
        return Some(Price::ZERO);
    }
    if method.name.to_uppercase().contains("RODES") {
        return Some(rodes_cost(weight_kg));
    }
    if method.weight_based_pricing {
        let cost = method.base_price.amount() + weight_kg * method.price_per_kg.amount();
        return Some(Price::new(cost).rounded());
    }
    Some(method.base_price)
}

/// Quote methods with legacy pricing, sorted by cost.
#[must_use]
pub fn quote_legacy(
    methods: &[ShippingMethod],
    weight_grams: i64,
    subtotal: Price,
) -> Vec<ShippingOption> {
    let mut options: Vec<ShippingOption> = methods
        .iter()
        .filter(|m| m.is_active)
        .filter_map(|m| {
            legacy_cost(m, weight_grams, subtotal).map(|cost| ShippingOption {
                method_id: Some(m.id),
                name: m.name.clone(),
                cost,
                estimated_days: m.estimated_days.clone(),
                is_free: !cost.is_positive(),
            })
        })
        .collect();
    options.sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.name.cmp(&b.name)));
    options
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::types::{ProvinceId, ZoneRateId};

    fn method(id: i32, name: &str, free_from_cents: i64) -> ShippingMethod {
        ShippingMethod {
            id: ShippingMethodId::new(id),
            name: name.into(),
            description: None,
            base_price: Price::from_cents(600),
            free_shipping_threshold: Price::from_cents(free_from_cents),
            weight_based_pricing: false,
            price_per_kg: Price::ZERO,
            max_weight: None,
            estimated_days: Some("24-48h".into()),
            is_active: true,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn rate(method_id: i32, min: i32, max: Option<i32>, cents: i64) -> ZoneRate {
        ZoneRate {
            id: ZoneRateId::new(method_id * 100 + min),
            zone_id: ShippingZoneId::new(1),
            shipping_method_id: ShippingMethodId::new(method_id),
            min_weight: min,
            max_weight: max,
            price: Price::from_cents(cents),
        }
    }

    fn provinces() -> Vec<Province> {
        vec![
            Province {
                id: ProvinceId::new(30),
                name: "Murcia".into(),
                code: Some("30".into()),
                zone_id: Some(ShippingZoneId::new(1)),
            },
            Province {
                id: ProvinceId::new(35),
                name: "Las Palmas".into(),
                code: Some("35".into()),
                zone_id: None,
            },
        ]
    }

    #[test]
    fn test_resolve_zone_is_case_insensitive() {
        assert_eq!(
            resolve_zone(" MURCIA ", &provinces()).unwrap(),
            ShippingZoneId::new(1)
        );
        assert_eq!(
            resolve_zone("Soria", &provinces()),
            Err(ShippingError::ProvinceNotFound)
        );
        assert_eq!(
            resolve_zone("las palmas", &provinces()),
            Err(ShippingError::ProvinceWithoutZone)
        );
    }

    #[test]
    fn test_quote_zone_picks_first_band_and_sorts() {
        let rates = vec![
            (rate(1, 0, Some(5_000), 900), method(1, "Urgente", 0)),
            (rate(1, 0, None, 2_000), method(1, "Urgente", 0)),
            (rate(2, 0, Some(10_000), 550), method(2, "Estándar", 0)),
            (rate(3, 20_000, None, 300), method(3, "Palet", 0)),
        ];
        let options = quote_zone(4_500, Price::from_cents(5_000), &rates, None).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].name, "Estándar");
        assert_eq!(options[0].cost, Price::from_cents(550));
        assert_eq!(options[1].cost, Price::from_cents(900));
    }

    #[test]
    fn test_quote_zone_max_weight_is_inclusive() {
        let rates = vec![(rate(1, 0, Some(5_000), 900), method(1, "Urgente", 0))];
        assert!(quote_zone(5_000, Price::ZERO, &rates, None).is_ok());
        assert_eq!(
            quote_zone(5_001, Price::ZERO, &rates, None),
            Err(ShippingError::NoMethodsAvailable)
        );
    }

    #[test]
    fn test_quote_zone_free_threshold() {
        let rates = vec![(rate(1, 0, None, 900), method(1, "Urgente", 10_000))];
        let below = quote_zone(1_000, Price::from_cents(9_999), &rates, None).unwrap();
        assert!(!below[0].is_free);
        let at = quote_zone(1_000, Price::from_cents(10_000), &rates, None).unwrap();
        assert!(at[0].is_free);
        assert_eq!(at[0].cost, Price::ZERO);
    }

    #[test]
    fn test_quote_zone_skips_inactive_methods() {
        let mut inactive = method(1, "Urgente", 0);
        inactive.is_active = false;
        let rates = vec![(rate(1, 0, None, 900), inactive)];
        assert_eq!(
            quote_zone(1_000, Price::ZERO, &rates, None),
            Err(ShippingError::NoMethodsAvailable)
        );
    }

    #[test]
    fn test_cash_means_pickup() {
        let options =
            quote_zone(1_000, Price::ZERO, &[], Some(PaymentProvider::Cash)).unwrap();
        assert_eq!(options, vec![pickup_option()]);
    }

    #[test]
    fn test_empty_cart_has_no_quote() {
        assert_eq!(
            quote_zone(0, Price::ZERO, &[], None),
            Err(ShippingError::EmptyCart)
        );
    }

    #[test]
    fn test_rodes_table() {
        let rodes = method(1, "Transportes RODES", 0);
        assert_eq!(legacy_cost(&rodes, 1_000, Price::ZERO), Some(Price::from_cents(350)));
        assert_eq!(legacy_cost(&rodes, 1_001, Price::ZERO), Some(Price::from_cents(400)));
        assert_eq!(legacy_cost(&rodes, 45_000, Price::ZERO), Some(Price::from_cents(1_550)));
        assert_eq!(legacy_cost(&rodes, 700_000, Price::ZERO), Some(Price::from_cents(9_100)));
    }

    #[test]
    fn test_legacy_weight_based_and_flat() {
        let mut per_kg = method(1, "Seur", 0);
        per_kg.weight_based_pricing = true;
        per_kg.price_per_kg = Price::from_cents(50);
        assert_eq!(legacy_cost(&per_kg, 2_500, Price::ZERO), Some(Price::from_cents(725)));

        let flat = method(2, "Correos", 0);
        assert_eq!(legacy_cost(&flat, 2_500, Price::ZERO), Some(Price::from_cents(600)));
    }

    #[test]
    fn test_legacy_max_weight_and_free() {
        let mut small = method(1, "Correos", 5_000);
        small.max_weight = Some(Decimal::from(2));
        assert_eq!(legacy_cost(&small, 2_001, Price::ZERO), None);
        assert_eq!(legacy_cost(&small, 1_500, Price::from_cents(5_000)), Some(Price::ZERO));

        let mut cheap = method(2, "Seur", 0);
        cheap.base_price = Price::from_cents(450);
        let options = quote_legacy(&[small, cheap], 1_500, Price::ZERO);
        assert_eq!(options[0].name, "Seur");
        assert_eq!(options[1].name, "Correos");
    }
}
