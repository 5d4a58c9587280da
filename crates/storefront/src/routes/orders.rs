//! Checkout and order history.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use desguace_core::cart::Cart;
use desguace_core::payment::{PaymentProvider, PaymentResult};
use desguace_core::{Email, Order, OrderId, OrderItem, Part, Price, ShippingMethodId, UserRole};

use crate::db::{
    CartRepository, CatalogRepository, NewOrder, NewOrderItem, NewOrderPayment, NewUser,
    OrderRepository, PaymentRepository,
};
use crate::error::{AppError, Result};
use crate::middleware::Shopper;
use crate::services::auth::{AuthError, AuthService, hash_password, validate_password};
use crate::services::payments::{PaymentManager, PaymentModule, payment_order};
use crate::state::AppState;

use super::shipping::{parse_provider, quote};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub nif_cif: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountInput {
    pub username: Option<String>,
    pub password: String,
}

/// Body of `POST /api/orders/local`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer: CustomerInput,
    pub shipping: AddressInput,
    pub billing: Option<AddressInput>,
    pub payment_method: String,
    pub shipping_method_id: Option<i32>,
    pub create_account: Option<CreateAccountInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub payment: PaymentResult,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Every problem with the customer and address fields.
fn validate_checkout(request: &CheckoutRequest) -> Vec<String> {
    let mut errors = Vec::new();
    if blank(&request.customer.name) {
        errors.push("El nombre es obligatorio".to_string());
    }
    if Email::parse(&request.customer.email).is_err() {
        errors.push("Email no válido".to_string());
    }
    let shipping = &request.shipping;
    if blank(&shipping.address) {
        errors.push("La dirección de envío es obligatoria".to_string());
    }
    if blank(&shipping.city) {
        errors.push("La ciudad es obligatoria".to_string());
    }
    if blank(&shipping.postal_code) {
        errors.push("El código postal es obligatorio".to_string());
    }
    if blank(&shipping.province) {
        errors.push("La provincia es obligatoria".to_string());
    }
    if let Some(account) = &request.create_account
        && let Err(AuthError::WeakPassword(msg)) = validate_password(&account.password)
    {
        errors.push(msg);
    }
    errors
}

/// Line snapshots for a cart whose parts were all found active.
fn order_items(cart: &Cart, parts: &[Part]) -> Result<Vec<NewOrderItem>> {
    cart.lines()
        .iter()
        .map(|line| {
            let part = parts
                .iter()
                .find(|p| p.id == line.part_id && p.activo)
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "La pieza \"{}\" ya no está disponible",
                        line.part_name
                    ))
                })?;
            Ok(NewOrderItem {
                part_id: part.id,
                part_name: part.descripcion_articulo.clone(),
                part_family: Some(part.descripcion_familia.clone()),
                part_reference: part
                    .ref_principal
                    .clone()
                    .or_else(|| Some(part.ref_local.to_string())),
                vehicle_brand: part.vehicle_marca.clone(),
                vehicle_model: part.vehicle_modelo.clone(),
                vehicle_year: part.vehicle_anyo,
                vehicle_version: part.vehicle_version.clone(),
                price: line.unit_price,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Shipping cost and method for the order, recomputed from the cart.
async fn shipping_for(
    state: &AppState,
    request: &CheckoutRequest,
    cart: &Cart,
    provider: PaymentProvider,
) -> Result<(Price, Option<ShippingMethodId>)> {
    if provider == PaymentProvider::Cash {
        return Ok((Price::ZERO, None));
    }
    let (options, _) = quote(
        state.pool(),
        &request.shipping.province,
        cart.total_weight_grams(),
        cart.subtotal(),
        Some(provider),
    )
    .await?;
    let chosen = match request.shipping_method_id.map(ShippingMethodId::new) {
        Some(id) => options.into_iter().find(|o| o.method_id == Some(id)),
        None => options.into_iter().next(),
    }
    .ok_or_else(|| AppError::BadRequest("Método de envío no disponible".to_string()))?;
    Ok((chosen.cost, chosen.method_id))
}

/// Place an order from the session cart.
#[instrument(skip(state, shopper, request), fields(payment_method = %request.payment_method))]
pub async fn create_local(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let errors = validate_checkout(&request);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let provider = parse_provider(Some(request.payment_method.as_str()))?
        .ok_or_else(|| AppError::BadRequest("Método de pago no válido".to_string()))?;

    let owner = shopper.owner();
    let cart = CartRepository::new(state.pool()).load(&owner).await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("El pedido está vacío".to_string()));
    }
    let part_ids: Vec<_> = cart.lines().iter().map(|l| l.part_id).collect();
    let parts = CatalogRepository::new(state.pool()).get_parts(&part_ids).await?;
    let items = order_items(&cart, &parts)?;

    let (shipping_cost, shipping_method_id) =
        shipping_for(&state, &request, &cart, provider).await?;

    let payments = PaymentManager::new(state.pool(), state.http(), &state.config().base_url);
    let module = payments.module_for(provider).await?;

    let subtotal = cart.subtotal();
    let billing = request.billing.as_ref();
    let new_order = NewOrder {
        user_id: shopper.user_id(),
        session_id: Some(shopper.token.clone()),
        customer_email: request.customer.email.trim().to_lowercase(),
        customer_name: request.customer.name.trim().to_owned(),
        customer_phone: non_empty(request.customer.phone.as_ref()),
        customer_nif_cif: non_empty(request.customer.nif_cif.as_ref()),
        shipping_address: request.shipping.address.trim().to_owned(),
        shipping_city: request.shipping.city.trim().to_owned(),
        shipping_postal_code: request.shipping.postal_code.trim().to_owned(),
        shipping_province: request.shipping.province.trim().to_owned(),
        shipping_country: non_empty(request.shipping.country.as_ref())
            .unwrap_or_else(|| "España".to_owned()),
        billing_address: billing.map(|b| b.address.clone()),
        billing_city: billing.map(|b| b.city.clone()),
        billing_postal_code: billing.map(|b| b.postal_code.clone()),
        billing_province: billing.map(|b| b.province.clone()),
        shipping_method_id,
        payment_method: provider.as_str().to_owned(),
        subtotal,
        shipping_cost,
        total: subtotal + shipping_cost,
        notes: non_empty(request.notes.as_ref()),
    };

    let orders = OrderRepository::new(state.pool());
    let mut order = orders.create(&new_order, &items).await?;
    info!(order_id = %order.id, order_number = %order.order_number, "Order created");

    if shopper.user.is_none()
        && let Some(account) = &request.create_account
    {
        create_account_for(&state, &order, account).await?;
        if let Some(linked) = orders.get(order.id).await? {
            order = linked;
        }
    }

    let gateway_order = payment_order(&order, &state.config().base_url);
    let payment = match module.process_payment(&gateway_order).await {
        Ok(result) => result,
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Payment could not be started");
            PaymentResult::failure(e.to_string())
        }
    };

    if !payment.success {
        orders.mark_failed(order.id).await?;
    } else if !provider.is_online() {
        let status = payment
            .data
            .as_ref()
            .and_then(|d| d.get("status"))
            .and_then(|s| s.as_str())
            .unwrap_or("pending");
        PaymentRepository::new(state.pool())
            .record(&NewOrderPayment {
                order_id: order.id,
                payment_method: provider.as_str().to_owned(),
                provider,
                transaction_id: payment.transaction_id.clone(),
                amount: order.total,
                status: status.to_owned(),
                gateway_response: payment.data.clone(),
            })
            .await?;
        CartRepository::new(state.pool()).clear(&owner).await?;
    }

    Ok((StatusCode::CREATED, Json(CheckoutResponse { order, payment })))
}

/// Create a customer account for a guest order and link it.
///
/// An existing account with the same email leaves the order as a guest order.
async fn create_account_for(
    state: &AppState,
    order: &Order,
    account: &CreateAccountInput,
) -> Result<()> {
    let email = Email::parse(&order.customer_email).map_err(AuthError::from)?;
    let username = non_empty(account.username.as_ref()).unwrap_or_else(|| email.to_string());
    let (first_name, last_name) = match order.customer_name.split_once(' ') {
        Some((first, last)) => (Some(first.to_owned()), Some(last.to_owned())),
        None => (Some(order.customer_name.clone()), None),
    };
    let new = NewUser {
        username,
        email,
        password_hash: hash_password(&account.password)?,
        role: UserRole::Customer,
        first_name,
        last_name,
        phone: order.customer_phone.clone(),
        address: Some(order.shipping_address.clone()),
        city: Some(order.shipping_city.clone()),
        postal_code: Some(order.shipping_postal_code.clone()),
        province: Some(order.shipping_province.clone()),
    };
    match AuthService::new(state.pool()).create(&new).await {
        Ok(user) => {
            OrderRepository::new(state.pool())
                .link_user(order.id, user.id)
                .await?;
            info!(order_id = %order.id, user_id = %user.id, "Account created at checkout");
            Ok(())
        }
        Err(AuthError::UserAlreadyExists) => {
            warn!(order_id = %order.id, "Checkout account already exists; order kept as guest");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Orders of the logged-in user, or of this session when browsing as a guest.
pub async fn list(State(state): State<AppState>, shopper: Shopper) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_owner(shopper.user_id(), Some(&shopper.token))
        .await?;
    Ok(Json(orders))
}

/// Load an order the shopper owns.
///
/// Orders owned by someone else are reported as missing.
pub(super) async fn owned_order(state: &AppState, shopper: &Shopper, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| o.is_owned_by(shopper.user_id(), Some(&shopper.token)))
        .ok_or_else(|| AppError::NotFound("Pedido no encontrado".to_string()))
}

/// One owned order with its lines.
#[instrument(skip(state, shopper))]
pub async fn show(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>> {
    let order = owned_order(&state, &shopper, OrderId::new(id)).await?;
    let items = OrderRepository::new(state.pool()).items(order.id).await?;
    Ok(Json(OrderDetail { order, items }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        serde_json::from_value(serde_json::json!({
            "customer": {"name": "Ana López", "email": "ana@example.com"},
            "shipping": {
                "address": "Calle Mayor 1",
                "city": "Murcia",
                "postalCode": "30001",
                "province": "Murcia"
            },
            "paymentMethod": "bank_transfer"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_checkout_has_no_errors() {
        assert!(validate_checkout(&request()).is_empty());
    }

    #[test]
    fn test_checkout_reports_every_problem() {
        let mut req = request();
        req.customer.name = " ".into();
        req.customer.email = "no-email".into();
        req.shipping.city = String::new();
        req.create_account = Some(CreateAccountInput {
            username: None,
            password: "short".into(),
        });
        let errors = validate_checkout(&req);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_order_items_reject_withdrawn_part() {
        let cart = Cart::from_lines(vec![desguace_core::cart::CartLine {
            part_id: desguace_core::PartId::new(3),
            quantity: 1,
            unit_price: Price::from_cents(1210),
            part_name: "Alternador".into(),
            part_family: None,
            part_image: None,
            part_reference: None,
            part_code: None,
            weight_grams: 500,
            vehicle_id: None,
        }]);
        let err = order_items(&cart, &[]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("Alternador")));
    }
}
