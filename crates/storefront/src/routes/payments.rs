//! Payment endpoints: method listing, gateway redirects and confirmations.
//!
//! Only verified confirmations mark an order paid: a signed Redsys
//! notification, a Stripe intent or webhook checked against the order total,
//! or a completed PayPal capture. All of them go through
//! [`PaymentManager::reconcile`], which is idempotent.

use std::collections::BTreeMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header::CONTENT_SECURITY_POLICY},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use desguace_core::payment::{
    PaymentProvider, failure_message, failure_solution, is_user_cancellation,
};
use desguace_core::{Order, OrderId, Price};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{Shopper, generate_nonce, redsys_form_csp};
use crate::services::payments::redsys::RedsysForm;
use crate::services::payments::{
    CallbackData, CallbackOutcome, Confirmation, OrderLookup, PaymentManager, PaymentModule,
    PublicPaymentMethod, payment_order,
};
use crate::state::AppState;

use super::orders::owned_order;

fn manager(state: &AppState) -> PaymentManager<'_> {
    PaymentManager::new(state.pool(), state.http(), &state.config().base_url)
}

/// An owned order that still needs paying.
async fn payable_order(state: &AppState, shopper: &Shopper, id: OrderId) -> Result<Order> {
    let order = owned_order(state, shopper, id).await?;
    if order.is_paid() {
        return Err(AppError::Conflict("El pedido ya está pagado".to_string()));
    }
    Ok(order)
}

async fn find_order(state: &AppState, lookup: &OrderLookup) -> Result<Option<Order>> {
    let orders = OrderRepository::new(state.pool());
    let order = match lookup {
        OrderLookup::Id(id) => orders.get(*id).await?,
        OrderLookup::RedsysOrder(reference) => orders.find_by_redsys_order(reference).await?,
    };
    Ok(order)
}

fn failure_redirect(code: Option<&str>) -> Redirect {
    let code = code.unwrap_or_default();
    Redirect::to(&format!(
        "/payment/failure?code={}&message={}",
        urlencoding::encode(code),
        urlencoding::encode(failure_message(Some(code)))
    ))
}

fn checkout_error_redirect(message: &str) -> Redirect {
    Redirect::to(&format!("/checkout?error={}", urlencoding::encode(message)))
}

fn success_redirect(order_id: OrderId) -> Redirect {
    Redirect::to(&format!("/payment/success?orderId={order_id}&cleared=true"))
}

/// Whether a gateway amount matches the order total. A missing amount is
/// accepted; the signature already covers the order.
fn amount_matches(order: &Order, amount: Option<Price>) -> bool {
    amount.is_none_or(|a| a.to_cents() == order.total.to_cents())
}

// =============================================================================
// Shared
// =============================================================================

/// Active payment methods without secrets.
pub async fn methods(State(state): State<AppState>) -> Result<Json<Vec<PublicPaymentMethod>>> {
    Ok(Json(manager(&state).available_methods().await?))
}

#[derive(Debug, Deserialize)]
pub struct FailureInfoQuery {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FailureInfo {
    pub code: Option<String>,
    pub message: &'static str,
    pub solution: &'static str,
    pub cancelled: bool,
}

/// Explain a gateway failure code to the customer.
pub async fn failure_info(Query(query): Query<FailureInfoQuery>) -> Json<FailureInfo> {
    let code = query.code.as_deref();
    Json(FailureInfo {
        message: failure_message(code),
        solution: failure_solution(code),
        cancelled: is_user_cancellation(code),
        code: query.code.clone(),
    })
}

// =============================================================================
// Redsys
// =============================================================================

/// Auto-submitting page that posts the signed form to Redsys.
#[derive(Template, WebTemplate)]
#[template(path = "payments/redsys_form.html")]
pub struct RedsysFormTemplate {
    pub order_number: String,
    pub amount: Price,
    pub form: RedsysForm,
    pub nonce: String,
}

/// Render the Redsys redirect form for an owned, unpaid order.
///
/// Problems send the customer back to checkout with a message.
#[instrument(skip(state, shopper))]
pub async fn redsys_form(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(order_id): Path<i32>,
) -> Response {
    match build_redsys_page(&state, &shopper, OrderId::new(order_id)).await {
        Ok(page) => {
            let csp = HeaderValue::from_str(&redsys_form_csp(&page.nonce));
            let mut response = page.into_response();
            if let Ok(csp) = csp {
                response.headers_mut().insert(CONTENT_SECURITY_POLICY, csp);
            }
            response
        }
        Err(AppError::NotFound(_)) => {
            checkout_error_redirect("Pedido no encontrado").into_response()
        }
        Err(AppError::Conflict(msg)) => checkout_error_redirect(&msg).into_response(),
        Err(e) => {
            warn!(error = %e, "Redsys form unavailable");
            checkout_error_redirect("El pago con tarjeta no está disponible").into_response()
        }
    }
}

async fn build_redsys_page(
    state: &AppState,
    shopper: &Shopper,
    order_id: OrderId,
) -> Result<RedsysFormTemplate> {
    let order = payable_order(state, shopper, order_id).await?;
    let module = manager(state).redsys().await?;
    let form = module.build_form(&payment_order(&order, &state.config().base_url), Utc::now())?;
    OrderRepository::new(state.pool())
        .set_redsys_order_number(order.id, &form.redsys_order_number)
        .await?;
    info!(order_id = %order.id, redsys_order = %form.redsys_order_number, "Redsys form issued");
    Ok(RedsysFormTemplate {
        order_number: order.order_number,
        amount: order.total,
        form,
        nonce: generate_nonce(),
    })
}

/// Apply a verified Redsys notification and pick where the customer goes.
async fn apply_redsys(state: &AppState, fields: BTreeMap<String, String>) -> Result<Redirect> {
    let payments = manager(state);
    let module = payments.redsys().await?;
    let outcome = module
        .handle_callback(&CallbackData {
            fields,
            ..CallbackData::default()
        })
        .await?;
    let code = outcome.response_code.clone();

    let order = match &outcome.lookup {
        Some(lookup) => find_order(state, lookup).await?,
        None => None,
    };
    let Some(order) = order else {
        warn!(response = ?code, "Redsys notification for unknown order");
        return Ok(failure_redirect(code.as_deref()));
    };

    if !outcome.authorised {
        info!(order_id = %order.id, response = ?code, "Redsys payment declined");
        OrderRepository::new(state.pool()).mark_failed(order.id).await?;
        return Ok(failure_redirect(code.as_deref()));
    }
    if !amount_matches(&order, outcome.amount) {
        warn!(order_id = %order.id, "Redsys amount differs from order total");
        return Ok(failure_redirect(code.as_deref()));
    }

    let amount = outcome.amount.unwrap_or(order.total);
    payments
        .reconcile(confirmation(&order, PaymentProvider::Redsys, "card", amount, outcome))
        .await?;
    Ok(success_redirect(order.id))
}

fn confirmation(
    order: &Order,
    provider: PaymentProvider,
    method: &'static str,
    amount: Price,
    outcome: CallbackOutcome,
) -> Confirmation {
    Confirmation {
        order_id: order.id,
        provider,
        method,
        transaction_id: outcome.transaction_id,
        amount,
        raw: outcome.raw,
    }
}

/// Server-to-server notification.
#[instrument(skip(state, fields))]
pub async fn redsys_callback(
    State(state): State<AppState>,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Result<Redirect> {
    apply_redsys(&state, fields).await
}

/// Customer returning from the Redsys page.
#[instrument(skip(state, fields))]
pub async fn redsys_return(
    State(state): State<AppState>,
    Query(fields): Query<BTreeMap<String, String>>,
) -> Result<Redirect> {
    apply_redsys(&state, fields).await
}

// =============================================================================
// Stripe
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    pub order_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub client_secret: Option<String>,
    pub publishable_key: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeConfirmRequest {
    pub order_id: i32,
    pub payment_intent_id: String,
}

/// Result of a synchronous confirmation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmed {
    pub success: bool,
    pub order_id: OrderId,
    pub status: String,
}

/// Create a payment intent for an owned, unpaid order.
#[instrument(skip(state, shopper))]
pub async fn stripe_create_intent(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<OrderRef>,
) -> Result<Json<IntentCreated>> {
    let order = payable_order(&state, &shopper, OrderId::new(request.order_id)).await?;
    let stripe = manager(&state).stripe().await?;
    let intent = stripe
        .create_intent(&payment_order(&order, &state.config().base_url))
        .await?;
    info!(order_id = %order.id, intent = %intent.id, "Stripe intent created");
    Ok(Json(IntentCreated {
        client_secret: intent.client_secret,
        publishable_key: stripe.public_key().to_owned(),
        payment_intent_id: intent.id,
    }))
}

/// Confirm an intent the client reports as finished.
#[instrument(skip(state, shopper, request), fields(order_id = request.order_id))]
pub async fn stripe_confirm(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<StripeConfirmRequest>,
) -> Result<Json<Confirmed>> {
    let order = owned_order(&state, &shopper, OrderId::new(request.order_id)).await?;
    let payments = manager(&state);
    let intent = payments
        .stripe()
        .await?
        .retrieve_intent(&request.payment_intent_id)
        .await?;

    let amount = Price::from_cents(intent.amount);
    let for_this_order = intent.order_id().is_none_or(|id| id == order.id);
    if !intent.succeeded() || !for_this_order || !amount_matches(&order, Some(amount)) {
        warn!(intent = %intent.id, status = %intent.status, "Stripe intent not confirmable");
        return Ok(Json(Confirmed {
            success: false,
            order_id: order.id,
            status: intent.status,
        }));
    }

    payments
        .reconcile(Confirmation {
            order_id: order.id,
            provider: PaymentProvider::Stripe,
            method: "card",
            transaction_id: Some(intent.id.clone()),
            amount,
            raw: json!({
                "id": intent.id,
                "status": intent.status,
                "amount": intent.amount,
                "metadata": intent.metadata,
            }),
        })
        .await?;
    Ok(Json(Confirmed {
        success: true,
        order_id: order.id,
        status: intent.status,
    }))
}

/// Signed Stripe event delivery.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let payments = manager(&state);
    let outcome = payments
        .stripe()
        .await?
        .handle_callback(&CallbackData {
            raw_body: Some(body),
            signature_header: signature,
            ..CallbackData::default()
        })
        .await?;

    if outcome.authorised
        && let Some(lookup) = outcome.lookup.clone()
    {
        match find_order(&state, &lookup).await? {
            Some(order) if amount_matches(&order, outcome.amount) => {
                let amount = outcome.amount.unwrap_or(order.total);
                payments
                    .reconcile(confirmation(&order, PaymentProvider::Stripe, "card", amount, outcome))
                    .await?;
            }
            Some(order) => warn!(order_id = %order.id, "Stripe amount differs from order total"),
            None => warn!(lookup = ?lookup, "Stripe event for unknown order"),
        }
    }
    Ok(Json(json!({ "received": true })))
}

// =============================================================================
// PayPal
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaypalOrderCreated {
    pub paypal_order_id: String,
    pub approve_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub order_id: i32,
    pub paypal_order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelQuery {
    pub order_id: Option<String>,
}

/// Create a PayPal order for an owned, unpaid order.
#[instrument(skip(state, shopper))]
pub async fn paypal_create_order(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<OrderRef>,
) -> Result<Json<PaypalOrderCreated>> {
    let order = payable_order(&state, &shopper, OrderId::new(request.order_id)).await?;
    let created = manager(&state)
        .paypal()
        .await?
        .create_order(&payment_order(&order, &state.config().base_url))
        .await?;
    Ok(Json(PaypalOrderCreated {
        paypal_order_id: created.paypal_order_id,
        approve_url: created.approve_url,
    }))
}

/// Capture an approved PayPal order.
#[instrument(skip(state, shopper, request), fields(order_id = request.order_id))]
pub async fn paypal_capture_order(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<CaptureRequest>,
) -> Result<Json<Confirmed>> {
    let order = owned_order(&state, &shopper, OrderId::new(request.order_id)).await?;
    let payments = manager(&state);
    let capture = payments
        .paypal()
        .await?
        .capture_order(&request.paypal_order_id)
        .await?;

    if !capture.completed() || !amount_matches(&order, capture.amount) {
        warn!(status = %capture.status, "PayPal capture not completed");
        OrderRepository::new(state.pool()).mark_failed(order.id).await?;
        return Ok(Json(Confirmed {
            success: false,
            order_id: order.id,
            status: capture.status,
        }));
    }

    payments
        .reconcile(Confirmation {
            order_id: order.id,
            provider: PaymentProvider::Paypal,
            method: "paypal",
            transaction_id: capture.capture_id.clone(),
            amount: capture.amount.unwrap_or(order.total),
            raw: capture.raw,
        })
        .await?;
    Ok(Json(Confirmed {
        success: true,
        order_id: order.id,
        status: capture.status,
    }))
}

/// The customer backed out on PayPal; this is not an error.
pub async fn paypal_cancel(Query(query): Query<CancelQuery>) -> Redirect {
    info!(order_id = ?query.order_id, "PayPal payment cancelled by customer");
    Redirect::to("/checkout?cancelled=true")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    fn location(redirect: Redirect) -> String {
        redirect
            .into_response()
            .headers()
            .get(LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[test]
    fn test_failure_redirect_carries_code_and_message() {
        let url = location(failure_redirect(Some("0190")));
        assert!(url.starts_with("/payment/failure?code=0190&message="));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_success_redirect() {
        assert_eq!(
            location(success_redirect(OrderId::new(42))),
            "/payment/success?orderId=42&cleared=true"
        );
    }

    #[tokio::test]
    async fn test_failure_info_for_cancellation() {
        let Json(info) = failure_info(Query(FailureInfoQuery {
            code: Some("9915".into()),
        }))
        .await;
        assert!(info.cancelled);
        assert_eq!(info.code.as_deref(), Some("9915"));
    }
}
