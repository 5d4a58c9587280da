//! Server-side carts.
//!
//! A cart belongs either to a logged-in user or to a guest token stored in
//! the session. Lines are rebuilt from the catalogue on every read so the
//! totals always come from `desguace_core::cart`.

use sqlx::{PgConnection, PgPool};

use desguace_core::cart::{Cart, CartLine};
use desguace_core::{CartId, Part, PartId, Price, UserId, VehicleId};

use super::{RepositoryError, conflict_on_unique};

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    /// Guest token kept in the session.
    Guest(String),
}

impl CartOwner {
    /// The user id, if logged in.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    quantity: i32,
    unit_price: Price,
    vehicle_id: Option<VehicleId>,
    #[sqlx(flatten)]
    part: Part,
}

impl CartItemRow {
    fn into_line(self) -> CartLine {
        CartLine {
            quantity: self.quantity,
            unit_price: self.unit_price,
            vehicle_id: self.vehicle_id,
            ..CartLine::from_part(&self.part)
        }
    }
}

/// Repository for cart persistence.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the cart row for an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<CartId>, RepositoryError> {
        let id = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_scalar::<_, CartId>("SELECT id FROM carts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(self.pool)
                    .await?
            }
            CartOwner::Guest(token) => {
                sqlx::query_scalar::<_, CartId>("SELECT id FROM carts WHERE session_id = $1")
                    .bind(token)
                    .fetch_optional(self.pool)
                    .await?
            }
        };
        Ok(id)
    }

    /// Get or create the cart row for an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_or_create(&self, owner: &CartOwner) -> Result<CartId, RepositoryError> {
        let id = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_scalar::<_, CartId>(
                    r"
                    INSERT INTO carts (user_id) VALUES ($1)
                    ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
                    RETURNING id
                    ",
                )
                .bind(user_id)
                .fetch_one(self.pool)
                .await?
            }
            CartOwner::Guest(token) => {
                sqlx::query_scalar::<_, CartId>(
                    r"
                    INSERT INTO carts (session_id) VALUES ($1)
                    ON CONFLICT (session_id) DO UPDATE SET updated_at = NOW()
                    RETURNING id
                    ",
                )
                .bind(token)
                .fetch_one(self.pool)
                .await?
            }
        };
        Ok(id)
    }

    /// Load the owner's cart. A missing cart is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, owner: &CartOwner) -> Result<Cart, RepositoryError> {
        let Some(cart_id) = self.find(owner).await? else {
            return Ok(Cart::default());
        };

        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT ci.quantity, ci.unit_price,
                   (SELECT v.id FROM vehicles v WHERE v.id_local = p.id_vehiculo) AS vehicle_id,
                   p.*
            FROM cart_items ci
            JOIN parts p ON p.id = ci.part_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(Cart::from_lines(
            rows.into_iter().map(CartItemRow::into_line).collect(),
        ))
    }

    /// Persist a line that `Cart::add` has accepted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the part is already in the cart.
    pub async fn add_line(&self, owner: &CartOwner, line: &CartLine) -> Result<(), RepositoryError> {
        let cart_id = self.find_or_create(owner).await?;
        sqlx::query(
            r"
            INSERT INTO cart_items (cart_id, part_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(cart_id)
        .bind(line.part_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "cart item"))?;
        Ok(())
    }

    /// Remove one part from the cart. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_line(
        &self,
        owner: &CartOwner,
        part_id: PartId,
    ) -> Result<bool, RepositoryError> {
        let Some(cart_id) = self.find(owner).await? else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND part_id = $2")
            .bind(cart_id)
            .bind(part_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every line from the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, owner: &CartOwner) -> Result<(), RepositoryError> {
        if let Some(cart_id) = self.find(owner).await? {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
                .bind(cart_id)
                .execute(self.pool)
                .await?;
        }
        Ok(())
    }

    /// Move a guest cart into a user's cart at login.
    ///
    /// Parts already in the user's cart are kept once; the guest cart is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn merge_guest(&self, token: &str, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest_cart = sqlx::query_scalar::<_, CartId>("SELECT id FROM carts WHERE session_id = $1")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(guest_cart) = guest_cart else {
            return Ok(());
        };

        let user_cart = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO carts (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO cart_items (cart_id, part_id, quantity, unit_price, created_at)
            SELECT $2, part_id, quantity, unit_price, created_at
            FROM cart_items WHERE cart_id = $1
            ON CONFLICT (cart_id, part_id) DO NOTHING
            ",
        )
        .bind(guest_cart)
        .bind(user_cart)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(guest_cart)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(user_id = %user_id, "Merged guest cart");
        Ok(())
    }
}

/// Empty the carts of an order's buyer inside an open transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn clear_in_tx(
    conn: &mut PgConnection,
    user_id: Option<UserId>,
    session_token: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM cart_items WHERE cart_id IN (
            SELECT id FROM carts
            WHERE ($1::int IS NOT NULL AND user_id = $1)
               OR ($2::text IS NOT NULL AND session_id = $2)
        )
        ",
    )
    .bind(user_id)
    .bind(session_token)
    .execute(conn)
    .await?;
    Ok(())
}
