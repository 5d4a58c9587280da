//! Shipping endpoints.

use axum::{
    Json,
    extract::State,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use desguace_core::payment::PaymentProvider;
use desguace_core::shipping::{ShippingOption, quote_zone, resolve_zone};
use desguace_core::{Price, Province, ShippingMethod};

use crate::db::{CartRepository, ShippingRepository};
use crate::error::{AppError, Result};
use crate::middleware::Shopper;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub province: String,
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub options: Vec<ShippingOption>,
    /// Cart weight in kilograms.
    pub weight: Decimal,
    pub subtotal: Price,
    pub zone: Option<String>,
}

/// Parse an optional payment method name from a request body.
pub(super) fn parse_provider(raw: Option<&str>) -> Result<Option<PaymentProvider>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<PaymentProvider>)
        .transpose()
        .map_err(|_| AppError::BadRequest("Método de pago no válido".to_string()))
}

/// Quote a cart's weight and subtotal for a province.
///
/// Returns the options and the zone name.
pub(super) async fn quote(
    pool: &PgPool,
    province: &str,
    weight_grams: i64,
    subtotal: Price,
    payment: Option<PaymentProvider>,
) -> Result<(Vec<ShippingOption>, Option<String>)> {
    let repo = ShippingRepository::new(pool);
    let provinces = repo.provinces().await?;
    let zone_id = resolve_zone(province, &provinces)?;
    let rates = repo.zone_rates(zone_id).await?;
    let options = quote_zone(weight_grams, subtotal, &rates, payment)?;
    let zone = repo.zone_name(zone_id).await?;
    Ok((options, zone))
}

pub async fn methods(State(state): State<AppState>) -> Result<Json<Vec<ShippingMethod>>> {
    Ok(Json(
        ShippingRepository::new(state.pool()).active_methods().await?,
    ))
}

/// Quote the session cart for a destination province.
#[instrument(skip(state, shopper))]
pub async fn calculate(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<CalculateRequest>,
) -> Result<Json<ShippingQuote>> {
    let payment = parse_provider(request.payment_method.as_deref())?;
    let cart = CartRepository::new(state.pool()).load(&shopper.owner()).await?;
    let weight_grams = cart.total_weight_grams();
    let subtotal = cart.subtotal();
    let (options, zone) =
        quote(state.pool(), &request.province, weight_grams, subtotal, payment).await?;

    Ok(Json(ShippingQuote {
        options,
        weight: Decimal::new(weight_grams, 3),
        subtotal,
        zone,
    }))
}

pub async fn provinces(State(state): State<AppState>) -> Result<Json<Vec<Province>>> {
    Ok(Json(ShippingRepository::new(state.pool()).provinces().await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider(None).unwrap(), None);
        assert_eq!(parse_provider(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_provider(Some("cash")).unwrap(),
            Some(PaymentProvider::Cash)
        );
        assert!(parse_provider(Some("bitcoin")).is_err());
    }
}
