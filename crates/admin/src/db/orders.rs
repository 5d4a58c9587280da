//! Order handling for staff: listing, status changes, trash and stats.

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use desguace_core::{
    Order, OrderId, OrderItem, OrderPayment, OrderStatus, PaymentStatus, Price, UserId,
};

use super::{Pagination, RepositoryError, require_affected};

const ORDER_COLUMNS: &str = "id, order_number, user_id, session_id, customer_email, \
     customer_name, customer_phone, customer_nif_cif, shipping_address, shipping_city, \
     shipping_postal_code, shipping_province, shipping_country, billing_address, billing_city, \
     billing_postal_code, billing_province, shipping_method_id, payment_method, subtotal, \
     shipping_cost, total, payment_status, order_status, notes, transport_agency, \
     expedition_number, admin_observations, is_deleted, deleted_at, created_at, updated_at";

/// Filters for the order table.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub payment_status: Option<PaymentStatus>,
    pub order_status: Option<OrderStatus>,
    /// Matches the order number, customer name or customer email.
    pub search: Option<String>,
    /// Inclusive, by creation day.
    pub date_from: Option<NaiveDate>,
    /// Inclusive, by creation day.
    pub date_to: Option<NaiveDate>,
}

impl OrderFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>, deleted: bool) {
        qb.push(" WHERE is_deleted = ").push_bind(deleted);
        if let Some(status) = self.payment_status {
            qb.push(" AND payment_status = ").push_bind(status);
        }
        if let Some(status) = self.order_status {
            qb.push(" AND order_status = ").push_bind(status);
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            qb.push(" AND (order_number ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR customer_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR customer_email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(from) = self.date_from {
            qb.push(" AND created_at >= ").push_bind(from.and_time(chrono::NaiveTime::MIN).and_utc());
        }
        if let Some(to) = self.date_to.and_then(|d| d.checked_add_days(Days::new(1))) {
            qb.push(" AND created_at < ").push_bind(to.and_time(chrono::NaiveTime::MIN).and_utc());
        }
    }
}

/// Shipping details staff fill in while preparing an order.
#[derive(Debug, Clone, Default)]
pub struct AdminInfoUpdate {
    pub transport_agency: Option<String>,
    pub expedition_number: Option<String>,
    pub admin_observations: Option<String>,
    /// Overrides; `None` keeps the customer's value.
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_province: Option<String>,
}

/// The columns the dashboard aggregates.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderStatRow {
    pub total: Price,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub payment_method: String,
    pub user_id: Option<UserId>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Repository for back-office order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn page(
        &self,
        filter: &OrderFilter,
        deleted: bool,
        page: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        filter.push_where(&mut count, deleted);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        filter.push_where(&mut qb, deleted);
        qb.push(if deleted {
            " ORDER BY deleted_at DESC NULLS LAST, id DESC"
        } else {
            " ORDER BY created_at DESC, id DESC"
        });
        qb.push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let orders = qb.build_query_as::<Order>().fetch_all(self.pool).await?;

        Ok((orders, total))
    }

    /// A page of live orders and the total matching the filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        self.page(filter, false, page).await
    }

    /// A page of soft-deleted orders, most recently deleted first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn trash(&self, page: Pagination) -> Result<(Vec<Order>, i64), RepositoryError> {
        self.page(&OrderFilter::default(), true, page).await
    }

    /// An order by ID, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
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
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, part_id, part_name, part_family, part_reference,
                   vehicle_brand, vehicle_model, vehicle_year, vehicle_version, price, quantity
            FROM order_items WHERE order_id = $1 ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Payments recorded against an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payments(&self, id: OrderId) -> Result<Vec<OrderPayment>, RepositoryError> {
        let payments = sqlx::query_as::<_, OrderPayment>(
            r"
            SELECT id, order_id, payment_method, payment_provider, transaction_id,
                   amount, currency, status, gateway_response, created_at
            FROM order_payments WHERE order_id = $1 ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(payments)
    }

    /// Move an order to the trash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no live order has this ID.
    pub async fn soft_delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        require_affected(result.rows_affected())
    }

    /// Take an order out of the trash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no trashed order has this ID.
    pub async fn restore(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET is_deleted = FALSE, deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND is_deleted = TRUE",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        require_affected(result.rows_affected())
    }

    /// Delete a trashed order with its lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no trashed order has this ID.
    pub async fn delete_permanently(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND is_deleted = TRUE")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// Set the payment status of a live order.
    ///
    /// Moving into `pagado` withdraws the purchased parts from sale in the
    /// same transaction. Returns the updated order and the previous status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no live order has this ID.
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<(Order, PaymentStatus), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, PaymentStatus>(
            "SELECT payment_status FROM orders WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET payment_status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        if status == PaymentStatus::Pagado && previous != PaymentStatus::Pagado {
            sqlx::query(
                r"
                UPDATE parts SET activo = FALSE, updated_at = NOW()
                WHERE id IN (SELECT part_id FROM order_items
                             WHERE order_id = $1 AND part_id IS NOT NULL)
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((order, previous))
    }

    /// Set the fulfilment status of a live order. Returns the updated order
    /// and the previous status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no live order has this ID.
    pub async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(Order, OrderStatus), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT order_status FROM orders WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET order_status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((order, previous))
    }

    /// Record shipping details and optional address corrections.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no live order has this ID.
    pub async fn update_admin_info(
        &self,
        id: OrderId,
        update: &AdminInfoUpdate,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET transport_agency = $2, expedition_number = $3, \
             admin_observations = $4, \
             shipping_address = COALESCE($5, shipping_address), \
             shipping_city = COALESCE($6, shipping_city), \
             shipping_postal_code = COALESCE($7, shipping_postal_code), \
             shipping_province = COALESCE($8, shipping_province), \
             updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.transport_agency)
        .bind(&update.expedition_number)
        .bind(&update.admin_observations)
        .bind(&update.shipping_address)
        .bind(&update.shipping_city)
        .bind(&update.shipping_postal_code)
        .bind(&update.shipping_province)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Every order created since `since`, deleted ones included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stat_rows(&self, since: DateTime<Utc>) -> Result<Vec<OrderStatRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderStatRow>(
            r"
            SELECT total, payment_status, order_status, payment_method, user_id,
                   is_deleted, created_at
            FROM orders WHERE created_at >= $1
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
