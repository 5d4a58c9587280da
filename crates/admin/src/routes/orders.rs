//! Order handling: listing, trash, status changes and shipping details.
//!
//! Status changes notify the customer by email in the background.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use desguace_core::{Order, OrderId, OrderItem, OrderPayment, OrderStatus, PaymentStatus};

use crate::db::{AdminInfoUpdate, OrderFilter, OrderRepository, Pagination};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireStaff};
use crate::services::EmailService;
use crate::services::order_stats::{self, OrderStats, STATS_WINDOW_DAYS};
use crate::state::AppState;

/// Payment statuses staff may set by hand.
pub const SETTABLE_PAYMENT_STATUSES: [PaymentStatus; 2] =
    [PaymentStatus::Pendiente, PaymentStatus::Pagado];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub payment_status: Option<PaymentStatus>,
    pub order_status: Option<OrderStatus>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<OrderPayment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRequest {
    pub order_status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminInfoRequest {
    pub transport_agency: Option<String>,
    pub expedition_number: Option<String>,
    pub admin_observations: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_province: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

impl From<AdminInfoRequest> for AdminInfoUpdate {
    fn from(req: AdminInfoRequest) -> Self {
        Self {
            transport_agency: blank_to_none(req.transport_agency),
            expedition_number: blank_to_none(req.expedition_number),
            admin_observations: blank_to_none(req.admin_observations),
            shipping_address: blank_to_none(req.shipping_address),
            shipping_city: blank_to_none(req.shipping_city),
            shipping_postal_code: blank_to_none(req.shipping_postal_code),
            shipping_province: blank_to_none(req.shipping_province),
        }
    }
}

fn order_page(orders: Vec<Order>, total: i64, query_page: Option<i64>, page: Pagination) -> OrderPage {
    OrderPage {
        orders,
        total,
        page: query_page.filter(|p| *p > 0).unwrap_or(1),
        total_pages: page.total_pages(total),
    }
}

pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<OrderQuery>,
) -> Result<Json<OrderPage>> {
    let page = Pagination::from_page(query.page, query.limit);
    let filter = OrderFilter {
        payment_status: query.payment_status,
        order_status: query.order_status,
        search: query.search,
        date_from: query.date_from,
        date_to: query.date_to,
    };
    let (orders, total) = OrderRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(order_page(orders, total, query.page, page)))
}

pub async fn trash(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<OrderQuery>,
) -> Result<Json<OrderPage>> {
    let page = Pagination::from_page(query.page, query.limit);
    let (orders, total) = OrderRepository::new(state.pool()).trash(page).await?;
    Ok(Json(order_page(orders, total, query.page, page)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pedido no encontrado".to_string()))?;
    let items = repo.items(id).await?;
    let payments = repo.payments(id).await?;
    Ok(Json(OrderDetail { order, items, payments }))
}

/// Move an order to the trash.
pub async fn soft_delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    OrderRepository::new(state.pool()).soft_delete(id).await?;
    info!(order_id = %id, by = %staff.id, "Order moved to trash");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    OrderRepository::new(state.pool()).restore(id).await?;
    info!(order_id = %id, by = %staff.id, "Order restored");
    Ok(StatusCode::NO_CONTENT)
}

/// Only trashed orders can be deleted for good.
pub async fn delete_permanently(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    OrderRepository::new(state.pool()).delete_permanently(id).await?;
    info!(order_id = %id, by = %admin.id, "Order deleted permanently");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, staff, request))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
    Json(request): Json<PaymentStatusRequest>,
) -> Result<Json<Order>> {
    if !SETTABLE_PAYMENT_STATUSES.contains(&request.payment_status) {
        return Err(AppError::BadRequest(
            "Estado de pago no válido: solo pendiente o pagado".to_string(),
        ));
    }
    let (order, previous) = OrderRepository::new(state.pool())
        .set_payment_status(id, request.payment_status)
        .await?;
    info!(
        order_id = %id,
        from = %previous,
        to = %order.payment_status,
        by = %staff.id,
        "Payment status changed"
    );

    if previous != order.payment_status
        && let Some(email) = state.email()
    {
        let email = email.clone();
        let order = order.clone();
        EmailService::spawn("payment_status", async move {
            email.send_payment_status(&order).await
        });
    }
    Ok(Json(order))
}

#[instrument(skip(state, staff, request))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<Order>> {
    let (order, previous) = OrderRepository::new(state.pool())
        .set_order_status(id, request.order_status)
        .await?;
    info!(
        order_id = %id,
        from = %previous,
        to = %order.order_status,
        by = %staff.id,
        "Order status changed"
    );

    if let Some(email) = state.email() {
        let email = email.clone();
        let order = order.clone();
        EmailService::spawn("order_status", async move {
            email.send_order_status(&order).await
        });
    }
    Ok(Json(order))
}

pub async fn update_admin_info(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
    Json(request): Json<AdminInfoRequest>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .update_admin_info(id, &request.into())
        .await?;
    Ok(Json(order))
}

/// Dashboard figures for the last 30 days.
pub async fn stats(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<OrderStats>> {
    let now = Utc::now();
    let rows = OrderRepository::new(state.pool())
        .stat_rows(now - TimeDelta::days(STATS_WINDOW_DAYS))
        .await?;
    Ok(Json(order_stats::compute(&rows, now)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_and_paid_are_settable() {
        assert!(SETTABLE_PAYMENT_STATUSES.contains(&PaymentStatus::Pagado));
        assert!(!SETTABLE_PAYMENT_STATUSES.contains(&PaymentStatus::Reembolsado));
        assert!(!SETTABLE_PAYMENT_STATUSES.contains(&PaymentStatus::Fallido));
    }

    #[test]
    fn test_order_query_parses_filters() {
        let query: OrderQuery = serde_json::from_str(
            r#"{"paymentStatus":"pagado","orderStatus":"pendiente_verificar","dateFrom":"2025-03-01"}"#,
        )
        .unwrap();
        assert_eq!(query.payment_status, Some(PaymentStatus::Pagado));
        assert_eq!(query.order_status, Some(OrderStatus::PendienteVerificar));
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn test_blank_admin_info_is_cleared() {
        let update: AdminInfoUpdate = AdminInfoRequest {
            transport_agency: Some("  SEUR ".into()),
            expedition_number: Some("   ".into()),
            ..AdminInfoRequest::default()
        }
        .into();
        assert_eq!(update.transport_agency.as_deref(), Some("SEUR"));
        assert_eq!(update.expedition_number, None);
        assert_eq!(update.shipping_city, None);
    }
}
