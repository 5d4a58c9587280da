//! Cart endpoints.
//!
//! The cart lives in the database, owned by the logged-in user or by the
//! guest token in the session. Every mutation is checked against
//! `desguace_core::cart` on the freshly loaded cart before it is written.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use desguace_core::PartId;
use desguace_core::cart::{CartError, CartLine, CartSummary};

use crate::db::{CartRepository, CatalogRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::Shopper;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub part_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

async fn summary(state: &AppState, shopper: &Shopper) -> Result<Json<CartSummary>> {
    let cart = CartRepository::new(state.pool()).load(&shopper.owner()).await?;
    Ok(Json(cart.summary()))
}

/// Current cart with totals.
pub async fn show(State(state): State<AppState>, shopper: Shopper) -> Result<Json<CartSummary>> {
    summary(&state, &shopper).await
}

/// Add a part to the cart at its current price with VAT.
#[instrument(skip(state, shopper))]
pub async fn add_item(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartSummary>)> {
    let part_id = PartId::new(request.part_id);
    let part = CatalogRepository::new(state.pool())
        .get_active_part(part_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pieza no disponible".to_string()))?;

    let owner = shopper.owner();
    let carts = CartRepository::new(state.pool());
    let mut cart = carts.load(&owner).await?;
    let line = CartLine::from_part(&part);
    cart.add(line.clone())?;
    carts.add_line(&owner, &line).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => AppError::Cart(CartError::AlreadyInCart(part_id)),
        other => AppError::Database(other),
    })?;

    info!(part_id = %part_id, "Part added to cart");
    Ok((StatusCode::CREATED, Json(cart.summary())))
}

/// Change a line's quantity. Zero removes it; anything else but one is refused.
#[instrument(skip(state, shopper))]
pub async fn update_item(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(part_id): Path<i32>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSummary>> {
    let part_id = PartId::new(part_id);
    let owner = shopper.owner();
    let carts = CartRepository::new(state.pool());
    let mut cart = carts.load(&owner).await?;
    let before = cart.contains(part_id);
    cart.update_quantity(part_id, request.quantity)?;
    if before && !cart.contains(part_id) {
        carts.remove_line(&owner, part_id).await?;
    }
    Ok(Json(cart.summary()))
}

/// Remove one part.
#[instrument(skip(state, shopper))]
pub async fn remove_item(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(part_id): Path<i32>,
) -> Result<Json<CartSummary>> {
    let part_id = PartId::new(part_id);
    if !CartRepository::new(state.pool())
        .remove_line(&shopper.owner(), part_id)
        .await?
    {
        return Err(AppError::NotFound(
            "Producto no encontrado en el carrito".to_string(),
        ));
    }
    summary(&state, &shopper).await
}

/// Empty the cart.
pub async fn clear(State(state): State<AppState>, shopper: Shopper) -> Result<Json<CartSummary>> {
    CartRepository::new(state.pool()).clear(&shopper.owner()).await?;
    summary(&state, &shopper).await
}
