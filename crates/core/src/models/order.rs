//! Orders, their line snapshots and recorded payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    OrderId, OrderItemId, OrderPaymentId, OrderStatus, PartId, PaymentStatus, Price,
    ShippingMethodId, UserId,
};

/// Human reference for an order id, e.g. `PED-000042`.
#[must_use]
pub fn order_reference(id: OrderId) -> String {
    format!("PED-{:06}", id.as_i32())
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    /// Session that placed a guest order; used for ownership checks.
    #[serde(skip_serializing)]
    pub session_id: Option<String>,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_nif_cif: Option<String>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_province: String,
    pub shipping_country: String,
    pub billing_address: Option<String>,
    pub billing_city: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_province: Option<String>,
    pub shipping_method_id: Option<ShippingMethodId>,
    pub payment_method: String,
    pub subtotal: Price,
    pub shipping_cost: Price,
    pub total: Price,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    pub transport_agency: Option<String>,
    pub expedition_number: Option<String>,
    pub admin_observations: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order belongs to the given user or guest session.
    #[must_use]
    pub fn is_owned_by(&self, user_id: Option<UserId>, session_id: Option<&str>) -> bool {
        match (self.user_id, user_id) {
            (Some(owner), Some(user)) if owner == user => true,
            _ => matches!(
                (self.session_id.as_deref(), session_id),
                (Some(owner), Some(session)) if owner == session
            ),
        }
    }

    /// Whether the order has been fully paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Pagado
    }

    /// Digits of the order number, used to match gateway references.
    #[must_use]
    pub fn number_digits(&self) -> String {
        self.order_number.chars().filter(char::is_ascii_digit).collect()
    }
}

/// Snapshot of a part at the moment it was ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub part_id: Option<PartId>,
    pub part_name: String,
    pub part_family: Option<String>,
    pub part_reference: Option<String>,
    pub vehicle_brand: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_year: Option<i32>,
    pub vehicle_version: Option<String>,
    pub price: Price,
    pub quantity: i32,
}

/// A payment recorded against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct OrderPayment {
    pub id: OrderPaymentId,
    pub order_id: OrderId,
    pub payment_method: String,
    pub payment_provider: String,
    pub transaction_id: Option<String>,
    pub amount: Price,
    pub currency: String,
    pub status: String,
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_reference_is_zero_padded() {
        assert_eq!(order_reference(OrderId::new(42)), "PED-000042");
        assert_eq!(order_reference(OrderId::new(1_234_567)), "PED-1234567");
    }
}
