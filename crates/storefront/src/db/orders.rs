//! Order persistence.

use sqlx::PgPool;

use desguace_core::models::order::order_reference;
use desguace_core::{
    Order, OrderId, OrderItem, PartId, PaymentStatus, Price, ShippingMethodId, UserId,
};

use super::RepositoryError;

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, user_id, session_id, customer_email, \
     customer_name, customer_phone, customer_nif_cif, shipping_address, shipping_city, \
     shipping_postal_code, shipping_province, shipping_country, billing_address, billing_city, \
     billing_postal_code, billing_province, shipping_method_id, payment_method, subtotal, \
     shipping_cost, total, payment_status, order_status, notes, transport_agency, \
     expedition_number, admin_observations, is_deleted, deleted_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, part_id, part_name, part_family, part_reference, \
     vehicle_brand, vehicle_model, vehicle_year, vehicle_version, price, quantity";

/// Data for a new order. Totals are computed by the caller.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
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
    pub notes: Option<String>,
}

/// Snapshot of a part for a new order line.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub part_id: PartId,
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

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its lines in one transaction.
    ///
    /// The id is reserved first so the `PED-000042` number is written by the
    /// same insert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// written in that case.
    pub async fn create(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: OrderId = sqlx::query_scalar::<_, i64>(
            "SELECT nextval(pg_get_serial_sequence('orders', 'id'))",
        )
        .fetch_one(&mut *tx)
        .await
        .map(|raw| i32::try_from(raw).map(OrderId::new))?
        .map_err(|_| RepositoryError::DataCorruption("order id out of range".to_owned()))?;

        let created = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (id, order_number, user_id, session_id, customer_email, \
             customer_name, customer_phone, customer_nif_cif, shipping_address, shipping_city, \
             shipping_postal_code, shipping_province, shipping_country, billing_address, \
             billing_city, billing_postal_code, billing_province, shipping_method_id, \
             payment_method, subtotal, shipping_cost, total, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(order_reference(id))
        .bind(order.user_id)
        .bind(&order.session_id)
        .bind(&order.customer_email)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_nif_cif)
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_postal_code)
        .bind(&order.shipping_province)
        .bind(&order.shipping_country)
        .bind(&order.billing_address)
        .bind(&order.billing_city)
        .bind(&order.billing_postal_code)
        .bind(&order.billing_province)
        .bind(order.shipping_method_id)
        .bind(&order.payment_method)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, part_id, part_name, part_family,
                    part_reference, vehicle_brand, vehicle_model, vehicle_year,
                    vehicle_version, price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(created.id)
            .bind(item.part_id)
            .bind(&item.part_name)
            .bind(&item.part_family)
            .bind(&item.part_reference)
            .bind(&item.vehicle_brand)
            .bind(&item.vehicle_model)
            .bind(item.vehicle_year)
            .bind(&item.vehicle_version)
            .bind(item.price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Get a non-deleted order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Orders placed by a user or, for guests, by the session's cart token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_owner(
        &self,
        user_id: Option<UserId>,
        session_token: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE is_deleted = FALSE AND ( \
                 ($1::int IS NOT NULL AND user_id = $1) \
                 OR ($2::text IS NOT NULL AND session_id = $2)) \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(session_token)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Record the Redsys reference issued for an order.
    ///
    /// References repeat once order numbers share their last four digits,
    /// so any other unpaid order holding the same value loses it and the
    /// newest form owns the reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_redsys_order_number(
        &self,
        id: OrderId,
        redsys_order: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE orders SET redsys_order_number = NULL, updated_at = NOW() \
             WHERE redsys_order_number = $1 AND id <> $2",
        )
        .bind(redsys_order)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query(
            "UPDATE orders SET redsys_order_number = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(redsys_order)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    /// The order a Redsys reference was issued for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_redsys_order(
        &self,
        redsys_order: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE is_deleted = FALSE AND redsys_order_number = $1"
        ))
        .bind(redsys_order)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Attach a newly created account to a guest order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn link_user(&self, id: OrderId, user_id: UserId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET user_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(user_id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a gateway failure on an unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_failed(&self, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE orders SET payment_status = $2, updated_at = NOW()
            WHERE id = $1 AND payment_status = $3
            ",
        )
        .bind(id)
        .bind(PaymentStatus::Fallido)
        .bind(PaymentStatus::Pendiente)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
