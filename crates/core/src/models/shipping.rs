//! Shipping methods, zones and weight-band rates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Price, ProvinceId, ShippingMethodId, ShippingZoneId, ZoneRateId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub description: Option<String>,
    pub base_price: Price,
    /// Subtotal from which shipping is free. Zero disables free shipping.
    pub free_shipping_threshold: Price,
    pub weight_based_pricing: bool,
    pub price_per_kg: Price,
    /// Maximum weight in kilograms the carrier accepts.
    pub max_weight: Option<rust_decimal::Decimal>,
    pub estimated_days: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ShippingZone {
    pub id: ShippingZoneId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Province {
    pub id: ProvinceId,
    pub name: String,
    pub code: Option<String>,
    pub zone_id: Option<ShippingZoneId>,
}

/// Price for a method within a zone for a weight band, in grams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ZoneRate {
    pub id: ZoneRateId,
    pub zone_id: ShippingZoneId,
    pub shipping_method_id: ShippingMethodId,
    pub min_weight: i32,
    /// Inclusive upper bound; `None` means unbounded.
    pub max_weight: Option<i32>,
    pub price: Price,
}
