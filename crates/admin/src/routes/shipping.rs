//! Shipping configuration: methods, zones, province mapping and weight bands.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use desguace_core::payment::PaymentProvider;
use desguace_core::shipping::{ShippingError, ShippingOption, quote_zone, resolve_zone};
use desguace_core::{
    Price, Province, ProvinceId, ShippingMethod, ShippingMethodId, ShippingZone, ShippingZoneId,
    ZoneRate, ZoneRateId,
};

use crate::db::{ShippingMethodInput, ShippingRepository, ZoneInput, ZoneRateInput};
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::state::AppState;

fn shipping_error(err: ShippingError) -> AppError {
    match err {
        ShippingError::ProvinceNotFound => AppError::NotFound(err.to_string()),
        _ => AppError::BadRequest(err.to_string()),
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("El nombre es obligatorio".to_string()));
    }
    Ok(())
}

// ===== Methods =====

pub async fn methods(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<ShippingMethod>>> {
    Ok(Json(ShippingRepository::new(state.pool()).methods().await?))
}

pub async fn method(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ShippingMethodId>,
) -> Result<Json<ShippingMethod>> {
    ShippingRepository::new(state.pool())
        .method(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Método de envío no encontrado".to_string()))
}

pub async fn create_method(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(input): Json<ShippingMethodInput>,
) -> Result<(StatusCode, Json<ShippingMethod>)> {
    require_name(&input.name)?;
    let method = ShippingRepository::new(state.pool())
        .create_method(&input)
        .await?;
    info!(method_id = %method.id, by = %staff.id, "Shipping method created");
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn update_method(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ShippingMethodId>,
    Json(input): Json<ShippingMethodInput>,
) -> Result<Json<ShippingMethod>> {
    require_name(&input.name)?;
    Ok(Json(
        ShippingRepository::new(state.pool())
            .update_method(id, &input)
            .await?,
    ))
}

pub async fn delete_method(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ShippingMethodId>,
) -> Result<StatusCode> {
    ShippingRepository::new(state.pool()).delete_method(id).await?;
    info!(method_id = %id, by = %staff.id, "Shipping method deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ===== Zones and provinces =====

pub async fn zones(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<ShippingZone>>> {
    Ok(Json(ShippingRepository::new(state.pool()).zones().await?))
}

pub async fn create_zone(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(input): Json<ZoneInput>,
) -> Result<(StatusCode, Json<ShippingZone>)> {
    require_name(&input.name)?;
    let zone = ShippingRepository::new(state.pool())
        .create_zone(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn update_zone(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ShippingZoneId>,
    Json(input): Json<ZoneInput>,
) -> Result<Json<ShippingZone>> {
    require_name(&input.name)?;
    Ok(Json(
        ShippingRepository::new(state.pool())
            .update_zone(id, &input)
            .await?,
    ))
}

pub async fn delete_zone(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ShippingZoneId>,
) -> Result<StatusCode> {
    ShippingRepository::new(state.pool()).delete_zone(id).await?;
    info!(zone_id = %id, by = %staff.id, "Shipping zone deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn provinces(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<Province>>> {
    Ok(Json(ShippingRepository::new(state.pool()).provinces().await?))
}

/// `{"zoneId": null}` leaves the province without a zone.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceZoneRequest {
    pub zone_id: Option<ShippingZoneId>,
}

pub async fn set_province_zone(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ProvinceId>,
    Json(request): Json<ProvinceZoneRequest>,
) -> Result<Json<Province>> {
    Ok(Json(
        ShippingRepository::new(state.pool())
            .set_province_zone(id, request.zone_id)
            .await?,
    ))
}

// ===== Zone rates =====

fn check_rate(input: &ZoneRateInput) -> Result<()> {
    let errors = input.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn zone_rates(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(zone_id): Path<ShippingZoneId>,
) -> Result<Json<Vec<ZoneRate>>> {
    Ok(Json(
        ShippingRepository::new(state.pool())
            .rates_by_zone(zone_id)
            .await?,
    ))
}

pub async fn create_rate(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(zone_id): Path<ShippingZoneId>,
    Json(input): Json<ZoneRateInput>,
) -> Result<(StatusCode, Json<ZoneRate>)> {
    check_rate(&input)?;
    let rate = ShippingRepository::new(state.pool())
        .create_rate(zone_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

pub async fn update_rate(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ZoneRateId>,
    Json(input): Json<ZoneRateInput>,
) -> Result<Json<ZoneRate>> {
    check_rate(&input)?;
    Ok(Json(
        ShippingRepository::new(state.pool())
            .update_rate(id, &input)
            .await?,
    ))
}

pub async fn delete_rate(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ZoneRateId>,
) -> Result<StatusCode> {
    ShippingRepository::new(state.pool()).delete_rate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Quote preview =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub province: String,
    pub weight_grams: i64,
    #[serde(default)]
    pub subtotal: Price,
    pub payment_method: Option<PaymentProvider>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePreview {
    pub zone_id: ShippingZoneId,
    pub options: Vec<ShippingOption>,
}

/// What a customer in `province` would be offered for this weight and subtotal.
pub async fn quote(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuotePreview>> {
    let repo = ShippingRepository::new(state.pool());
    let provinces = repo.provinces().await?;
    let zone_id = resolve_zone(&request.province, &provinces).map_err(shipping_error)?;
    let rates = repo.zone_rates(zone_id).await?;
    let options = quote_zone(
        request.weight_grams,
        request.subtotal,
        &rates,
        request.payment_method,
    )
    .map_err(shipping_error)?;
    Ok(Json(QuotePreview { zone_id, options }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_error_statuses() {
        assert_eq!(
            shipping_error(ShippingError::ProvinceNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            shipping_error(ShippingError::NoMethodsAvailable).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_quote_request_defaults() {
        let request: QuoteRequest =
            serde_json::from_str(r#"{"province":"Murcia","weightGrams":2500}"#).unwrap();
        assert_eq!(request.subtotal, Price::ZERO);
        assert_eq!(request.payment_method, None);
    }

    #[test]
    fn test_province_zone_can_be_cleared() {
        let request: ProvinceZoneRequest = serde_json::from_str(r#"{"zoneId":null}"#).unwrap();
        assert_eq!(request.zone_id, None);
    }

    #[test]
    fn test_blank_names_are_rejected() {
        assert!(require_name("  ").is_err());
        assert!(require_name("Península").is_ok());
    }
}
