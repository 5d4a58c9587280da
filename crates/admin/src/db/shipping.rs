//! Shipping methods, zones, provinces and zone rates.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use desguace_core::{
    Price, Province, ProvinceId, ShippingMethod, ShippingMethodId, ShippingZone, ShippingZoneId,
    ZoneRate, ZoneRateId,
};

use super::{RepositoryError, conflict_on_unique, default_true, require_affected};

const METHOD_COLUMNS: &str = "id, name, description, base_price, \
     free_shipping_threshold, weight_based_pricing, price_per_kg, max_weight, estimated_days, \
     is_active, created_at, updated_at";

const RATE_COLUMNS: &str = "id, zone_id, shipping_method_id, min_weight, max_weight, price";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethodInput {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Price,
    pub free_shipping_threshold: Price,
    #[serde(default)]
    pub weight_based_pricing: bool,
    #[serde(default)]
    pub price_per_kg: Price,
    pub max_weight: Option<Decimal>,
    pub estimated_days: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A weight band. Weights are grams.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRateInput {
    pub shipping_method_id: ShippingMethodId,
    #[serde(default)]
    pub min_weight: i32,
    pub max_weight: Option<i32>,
    pub price: Price,
}

impl ZoneRateInput {
    /// Field errors, empty when the band is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.min_weight < 0 {
            errors.push("El peso mínimo no puede ser negativo".to_owned());
        }
        if let Some(max) = self.max_weight
            && max <= self.min_weight
        {
            errors.push("El peso máximo debe ser mayor que el mínimo".to_owned());
        }
        if self.price.amount() < Decimal::ZERO {
            errors.push("El precio no puede ser negativo".to_owned());
        }
        errors
    }
}

/// Repository for shipping configuration.
pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    /// Create a new shipping repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // ===== Methods =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn methods(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let methods = sqlx::query_as::<_, ShippingMethod>(&format!(
            "SELECT {METHOD_COLUMNS} FROM shipping_methods ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(methods)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn method(
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

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_method(
        &self,
        input: &ShippingMethodInput,
    ) -> Result<ShippingMethod, RepositoryError> {
        let method = sqlx::query_as::<_, ShippingMethod>(&format!(
            "INSERT INTO shipping_methods (name, description, base_price, \
             free_shipping_threshold, weight_based_pricing, price_per_kg, max_weight, \
             estimated_days, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {METHOD_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.base_price)
        .bind(input.free_shipping_threshold)
        .bind(input.weight_based_pricing)
        .bind(input.price_per_kg)
        .bind(input.max_weight)
        .bind(&input.estimated_days)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(method)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown method.
    pub async fn update_method(
        &self,
        id: ShippingMethodId,
        input: &ShippingMethodInput,
    ) -> Result<ShippingMethod, RepositoryError> {
        sqlx::query_as::<_, ShippingMethod>(&format!(
            "UPDATE shipping_methods SET name = $2, description = $3, base_price = $4, \
             free_shipping_threshold = $5, weight_based_pricing = $6, price_per_kg = $7, \
             max_weight = $8, estimated_days = $9, is_active = $10, updated_at = NOW() \
             WHERE id = $1 RETURNING {METHOD_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.base_price)
        .bind(input.free_shipping_threshold)
        .bind(input.weight_based_pricing)
        .bind(input.price_per_kg)
        .bind(input.max_weight)
        .bind(&input.estimated_days)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a method and, through the cascade, its zone rates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown method.
    pub async fn delete_method(&self, id: ShippingMethodId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_methods WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    // ===== Zones =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn zones(&self) -> Result<Vec<ShippingZone>, RepositoryError> {
        let zones = sqlx::query_as::<_, ShippingZone>(
            "SELECT id, name, description, is_active FROM shipping_zones ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(zones)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_zone(&self, input: &ZoneInput) -> Result<ShippingZone, RepositoryError> {
        sqlx::query_as::<_, ShippingZone>(
            "INSERT INTO shipping_zones (name, description, is_active) VALUES ($1, $2, $3) \
             RETURNING id, name, description, is_active",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "zone name"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown zone and
    /// `RepositoryError::Conflict` if the new name is taken.
    pub async fn update_zone(
        &self,
        id: ShippingZoneId,
        input: &ZoneInput,
    ) -> Result<ShippingZone, RepositoryError> {
        sqlx::query_as::<_, ShippingZone>(
            "UPDATE shipping_zones SET name = $2, description = $3, is_active = $4 \
             WHERE id = $1 RETURNING id, name, description, is_active",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "zone name"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a zone. Its rates go with it; its provinces become unzoned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown zone.
    pub async fn delete_zone(&self, id: ShippingZoneId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_zones WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    // ===== Provinces =====

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

    /// Move a province to a zone, or out of every zone with `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown province and
    /// `RepositoryError::Conflict` for an unknown zone.
    pub async fn set_province_zone(
        &self,
        id: ProvinceId,
        zone_id: Option<ShippingZoneId>,
    ) -> Result<Province, RepositoryError> {
        sqlx::query_as::<_, Province>(
            "UPDATE provinces SET zone_id = $2 WHERE id = $1 RETURNING id, name, code, zone_id",
        )
        .bind(id)
        .bind(zone_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                RepositoryError::Conflict("unknown zone".to_owned())
            }
            other => RepositoryError::Database(other),
        })?
        .ok_or(RepositoryError::NotFound)
    }

    // ===== Zone rates =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rates_by_zone(&self, zone_id: ShippingZoneId) -> Result<Vec<ZoneRate>, RepositoryError> {
        let rates = sqlx::query_as::<_, ZoneRate>(&format!(
            "SELECT {RATE_COLUMNS} FROM shipping_zone_rates WHERE zone_id = $1 \
             ORDER BY shipping_method_id, min_weight, id"
        ))
        .bind(zone_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rates)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when the zone or method does not exist.
    pub async fn create_rate(
        &self,
        zone_id: ShippingZoneId,
        input: &ZoneRateInput,
    ) -> Result<ZoneRate, RepositoryError> {
        sqlx::query_as::<_, ZoneRate>(&format!(
            "INSERT INTO shipping_zone_rates (zone_id, shipping_method_id, min_weight, \
             max_weight, price) VALUES ($1, $2, $3, $4, $5) RETURNING {RATE_COLUMNS}"
        ))
        .bind(zone_id)
        .bind(input.shipping_method_id)
        .bind(input.min_weight)
        .bind(input.max_weight)
        .bind(input.price)
        .fetch_one(self.pool)
        .await
        .map_err(rate_write_error)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown rate.
    pub async fn update_rate(
        &self,
        id: ZoneRateId,
        input: &ZoneRateInput,
    ) -> Result<ZoneRate, RepositoryError> {
        sqlx::query_as::<_, ZoneRate>(&format!(
            "UPDATE shipping_zone_rates SET shipping_method_id = $2, min_weight = $3, \
             max_weight = $4, price = $5 WHERE id = $1 RETURNING {RATE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.shipping_method_id)
        .bind(input.min_weight)
        .bind(input.max_weight)
        .bind(input.price)
        .fetch_optional(self.pool)
        .await
        .map_err(rate_write_error)?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown rate.
    pub async fn delete_rate(&self, id: ZoneRateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_zone_rates WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// A zone's rates joined with their methods, for quote previews.
    ///
    /// Inactive zones yield nothing. Inactive methods are kept so staff can
    /// preview a method before switching it on.
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

        let methods = self.methods().await?;
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

fn rate_write_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::Conflict("unknown zone or shipping method".to_owned())
        }
        sqlx::Error::Database(db) if db.is_check_violation() => {
            RepositoryError::Conflict("invalid weight band".to_owned())
        }
        other => RepositoryError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(min: i32, max: Option<i32>, price: i64) -> ZoneRateInput {
        ZoneRateInput {
            shipping_method_id: ShippingMethodId::new(1),
            min_weight: min,
            max_weight: max,
            price: Price::from_cents(price),
        }
    }

    #[test]
    fn test_valid_band() {
        assert!(band(0, Some(2000), 595).validate().is_empty());
        assert!(band(30_000, None, 0).validate().is_empty());
    }

    #[test]
    fn test_band_bounds() {
        assert_eq!(band(-1, None, 100).validate().len(), 1);
        assert_eq!(band(500, Some(500), 100).validate().len(), 1);
        assert_eq!(band(500, Some(100), -5).validate().len(), 2);
    }
}
