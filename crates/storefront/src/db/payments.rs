//! Payment configuration reads and payment recording.

use serde_json::Value;
use sqlx::PgPool;

use desguace_core::payment::PaymentProvider;
use desguace_core::{
    OrderId, OrderPayment, OrderStatus, PaymentConfig, PaymentStatus, Price, UserId,
};

use super::{RepositoryError, carts};

const CONFIG_COLUMNS: &str =
    "id, provider, name, is_active, config, sort_order, created_at, updated_at";

/// A payment about to be recorded against an order.
#[derive(Debug, Clone)]
pub struct NewOrderPayment {
    pub order_id: OrderId,
    /// How the customer paid (`card`, `paypal`, `bank_transfer`, `cash`).
    pub payment_method: String,
    pub provider: PaymentProvider,
    pub transaction_id: Option<String>,
    pub amount: Price,
    /// `completed` or `pending`.
    pub status: String,
    pub gateway_response: Option<Value>,
}

/// Repository for payment modules and recorded payments.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active payment configurations in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_configs(&self) -> Result<Vec<PaymentConfig>, RepositoryError> {
        let configs = sqlx::query_as::<_, PaymentConfig>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM payment_config \
             WHERE is_active = TRUE ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(configs)
    }

    /// The active configuration for a provider, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_config(
        &self,
        provider: PaymentProvider,
    ) -> Result<Option<PaymentConfig>, RepositoryError> {
        let config = sqlx::query_as::<_, PaymentConfig>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM payment_config \
             WHERE provider = $1 AND is_active = TRUE"
        ))
        .bind(provider)
        .fetch_optional(self.pool)
        .await?;
        Ok(config)
    }

    /// Record a payment without touching the order (bank transfer, cash).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, payment: &NewOrderPayment) -> Result<OrderPayment, RepositoryError> {
        let recorded = sqlx::query_as::<_, OrderPayment>(
            r"
            INSERT INTO order_payments (order_id, payment_method, payment_provider,
                transaction_id, amount, currency, status, gateway_response)
            VALUES ($1, $2, $3, $4, $5, 'EUR', $6, $7)
            RETURNING id, order_id, payment_method, payment_provider, transaction_id,
                      amount, currency, status, gateway_response, created_at
            ",
        )
        .bind(payment.order_id)
        .bind(&payment.payment_method)
        .bind(payment.provider.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.amount)
        .bind(&payment.status)
        .bind(&payment.gateway_response)
        .fetch_one(self.pool)
        .await?;
        Ok(recorded)
    }

    /// Mark an order paid after a verified gateway confirmation.
    ///
    /// In one transaction: sets `pagado` (the order stays
    /// `pendiente_verificar` for staff), records the payment, withdraws the
    /// purchased parts from sale and empties the buyer's carts.
    ///
    /// Returns `false` without writing anything if the order was already paid,
    /// so replayed callbacks are harmless.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Database` if any statement fails.
    pub async fn mark_paid(&self, payment: &NewOrderPayment) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (PaymentStatus, Option<UserId>, Option<String>)>(
            r"
            SELECT payment_status, user_id, session_id
            FROM orders WHERE id = $1 AND is_deleted = FALSE
            FOR UPDATE
            ",
        )
        .bind(payment.order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((status, user_id, session_id)) = row else {
            return Err(RepositoryError::NotFound);
        };
        if status == PaymentStatus::Pagado {
            return Ok(false);
        }

        sqlx::query(
            r"
            UPDATE orders SET payment_status = $2, order_status = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(payment.order_id)
        .bind(PaymentStatus::Pagado)
        .bind(OrderStatus::PendienteVerificar)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO order_payments (order_id, payment_method, payment_provider,
                transaction_id, amount, currency, status, gateway_response)
            VALUES ($1, $2, $3, $4, $5, 'EUR', $6, $7)
            ",
        )
        .bind(payment.order_id)
        .bind(&payment.payment_method)
        .bind(payment.provider.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.amount)
        .bind(&payment.status)
        .bind(&payment.gateway_response)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE parts SET activo = FALSE, updated_at = NOW()
            WHERE id IN (SELECT part_id FROM order_items WHERE order_id = $1 AND part_id IS NOT NULL)
            ",
        )
        .bind(payment.order_id)
        .execute(&mut *tx)
        .await?;

        carts::clear_in_tx(&mut *tx, user_id, session_id.as_deref()).await?;

        tx.commit().await?;
        Ok(true)
    }
}
