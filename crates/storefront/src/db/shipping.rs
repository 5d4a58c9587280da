//! Shipping methods, provinces and zone rates.

use sqlx::PgPool;

use desguace_core::{Province, ShippingMethod, ShippingMethodId, ShippingZoneId, ZoneRate};

use super::RepositoryError;

pub(crate) const METHOD_COLUMNS: &str = "id, name, description, base_price, \
     free_shipping_threshold, weight_based_pricing, price_per_kg, max_weight, estimated_days, \
     is_active, created_at, updated_at";

/// Repository for shipping reads.
pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    /// Create a new shipping repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active shipping methods ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_methods(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let methods = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM shipping_methods WHERE is_active = TRUE ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(methods)
    }

    /// A method by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_method(
        &self,
        id: ShippingMethodId,
    ) -> Result<Option<ShippingMethod>, RepositoryError> {
        let method = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM shipping_methods WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(method)
    }

    /// All provinces with their zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn provinces(&self) -> Result<Vec<Province>, RepositoryError> {
        let provinces = sqlx::query_as::<_, Province>(
            "SELECT id, name, code, zone_id FROM provinces ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(provinces)
    }

    /// Name of a zone, for display in quotes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn zone_name(&self, id: ShippingZoneId) -> Result<Option<String>, RepositoryError> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM shipping_zones WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(name)
    }

    /// A zone's rates joined with their methods, ordered by method and lower
    /// weight bound so the first matching band per method wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn zone_rates(
        &self,
        zone_id: ShippingZoneId,
    ) -> Result<Vec<(ZoneRate, ShippingMethod)>, RepositoryError> {
        let rates = sqlx::query_as::<_, ZoneRate>(
            r"
            SELECT r.id, r.zone_id, r.shipping_method_id, r.min_weight, r.max_weight, r.price
            FROM shipping_zone_rates r
            JOIN shipping_zones z ON z.id = r.zone_id
            WHERE r.zone_id = $1 AND z.is_active = TRUE
            ORDER BY r.shipping_method_id, r.min_weight, r.id
            ",
        )
        .bind(zone_id)
        .fetch_all(self.pool)
        .await?;

        let method_ids: Vec<i32> = rates.iter().map(|r| r.shipping_method_id.as_i32()).collect();
        let methods = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM shipping_methods WHERE id = ANY($1)"
        ))
        .bind(method_ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rates
            .into_iter()
            .filter_map(|rate| {
                methods
                    .iter()
                    .find(|m| m.id == rate.shipping_method_id)
                    .map(|m| (rate, m.clone()))
            })
            .collect())
    }
}
