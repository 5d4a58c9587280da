//! Catalogue queries: parts, vehicles and filter facets.
//!
//! Only active parts are visible to customers. Filters are bound as nullable
//! parameters so a single statement covers every combination.

use serde::Serialize;
use sqlx::PgPool;

use desguace_core::{Part, PartId, Vehicle, VehicleId};

use super::{Pagination, RepositoryError};

pub(crate) const PART_COLUMNS: &str = "id, ref_local, id_empresa, id_vehiculo, vehicle_marca, \
     vehicle_modelo, vehicle_version, vehicle_anyo, combustible, cod_familia, descripcion_familia, \
     cod_articulo, descripcion_articulo, ref_principal, anyo_inicio, anyo_fin, precio, peso, \
     observaciones, reserva, situacion, imagenes, activo, disponible_api, created_at, updated_at";

const VEHICLE_COLUMNS: &str = "id, id_local, id_empresa, marca, modelo, version, anyo, \
     descripcion, combustible, bastidor, matricula, color, kilometraje, potencia, puertas, \
     imagenes, activo, active_parts_count, total_parts_count, created_at, updated_at";

const PART_FILTER: &str = "activo = TRUE \
     AND ($1::text IS NULL OR vehicle_marca ILIKE $1) \
     AND ($2::text IS NULL OR vehicle_modelo ILIKE $2) \
     AND ($3::text IS NULL OR descripcion_familia ILIKE $3) \
     AND ($4::int IS NULL OR vehicle_anyo = $4 OR ($4 BETWEEN anyo_inicio AND anyo_fin)) \
     AND ($5::text IS NULL OR combustible ILIKE $5) \
     AND ($6::text IS NULL OR descripcion_articulo ILIKE '%' || $6 || '%' \
          OR descripcion_familia ILIKE '%' || $6 || '%' \
          OR ref_principal ILIKE '%' || $6 || '%' \
          OR ref_local::text = $6) \
     AND ($7::int IS NULL OR id_vehiculo = (SELECT id_local FROM vehicles WHERE id = $7))";

const VEHICLE_FILTER: &str = "activo = TRUE \
     AND ($1::text IS NULL OR marca ILIKE $1) \
     AND ($2::text IS NULL OR modelo ILIKE $2) \
     AND ($3::int IS NULL OR anyo = $3) \
     AND ($4::text IS NULL OR combustible ILIKE $4) \
     AND ($5::text IS NULL OR marca ILIKE '%' || $5 || '%' \
          OR modelo ILIKE '%' || $5 || '%' \
          OR version ILIKE '%' || $5 || '%' \
          OR matricula ILIKE '%' || $5 || '%')";

/// Part listing filters. Empty strings are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct PartFilter {
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub familia: Option<String>,
    pub anyo: Option<i32>,
    pub combustible: Option<String>,
    pub search: Option<String>,
    pub vehicle_id: Option<VehicleId>,
}

/// Vehicle listing filters.
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub anyo: Option<i32>,
    pub combustible: Option<String>,
    pub search: Option<String>,
}

/// Counts reported by the merchant feed stats endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub total_parts: i64,
    pub valid_parts: i64,
    pub parts_with_images: i64,
    pub parts_with_price: i64,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Repository for catalogue reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalogue repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active parts matching the filter, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_parts(
        &self,
        filter: &PartFilter,
        page: Pagination,
    ) -> Result<(Vec<Part>, i64), RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM parts WHERE {PART_FILTER}"
        ))
        .bind(non_empty(filter.marca.as_ref()))
        .bind(non_empty(filter.modelo.as_ref()))
        .bind(non_empty(filter.familia.as_ref()))
        .bind(filter.anyo)
        .bind(non_empty(filter.combustible.as_ref()))
        .bind(non_empty(filter.search.as_ref()))
        .bind(filter.vehicle_id)
        .fetch_one(self.pool)
        .await?;

        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE {PART_FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $8 OFFSET $9"
        ))
        .bind(non_empty(filter.marca.as_ref()))
        .bind(non_empty(filter.modelo.as_ref()))
        .bind(non_empty(filter.familia.as_ref()))
        .bind(filter.anyo)
        .bind(non_empty(filter.combustible.as_ref()))
        .bind(non_empty(filter.search.as_ref()))
        .bind(filter.vehicle_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        Ok((parts, total))
    }

    /// Get an active part by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_part(&self, id: PartId) -> Result<Option<Part>, RepositoryError> {
        let part = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE id = $1 AND activo = TRUE"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(part)
    }

    /// Get parts by ID regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_parts(&self, ids: &[PartId]) -> Result<Vec<Part>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(PartId::as_i32).collect();
        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;
        Ok(parts)
    }

    /// Look up a part by its Metasync `refLocal`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_ref_local(&self, ref_local: i64) -> Result<Option<Part>, RepositoryError> {
        let part = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE ref_local = $1"
        ))
        .bind(ref_local)
        .fetch_optional(self.pool)
        .await?;
        Ok(part)
    }

    /// Free-text search over active parts (description, family, references,
    /// donor brand and model). At most 50 results.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_parts(&self, query: &str) -> Result<Vec<Part>, RepositoryError> {
        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts \
             WHERE activo = TRUE AND ( \
                 descripcion_articulo ILIKE '%' || $1 || '%' \
                 OR descripcion_familia ILIKE '%' || $1 || '%' \
                 OR ref_local::text = $1 \
                 OR ref_principal ILIKE '%' || $1 || '%' \
                 OR vehicle_marca ILIKE '%' || $1 || '%' \
                 OR vehicle_modelo ILIKE '%' || $1 || '%') \
             ORDER BY created_at DESC LIMIT 50"
        ))
        .bind(query.trim())
        .fetch_all(self.pool)
        .await?;
        Ok(parts)
    }

    /// List active vehicles matching the filter, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_vehicles(
        &self,
        filter: &VehicleFilter,
        page: Pagination,
    ) -> Result<(Vec<Vehicle>, i64), RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM vehicles WHERE {VEHICLE_FILTER}"
        ))
        .bind(non_empty(filter.marca.as_ref()))
        .bind(non_empty(filter.modelo.as_ref()))
        .bind(filter.anyo)
        .bind(non_empty(filter.combustible.as_ref()))
        .bind(non_empty(filter.search.as_ref()))
        .fetch_one(self.pool)
        .await?;

        let vehicles = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE {VEHICLE_FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(non_empty(filter.marca.as_ref()))
        .bind(non_empty(filter.modelo.as_ref()))
        .bind(filter.anyo)
        .bind(non_empty(filter.combustible.as_ref()))
        .bind(non_empty(filter.search.as_ref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        Ok((vehicles, total))
    }

    /// Get a vehicle by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(vehicle)
    }

    /// Active parts recovered from a vehicle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn vehicle_parts(&self, vehicle: &Vehicle) -> Result<Vec<Part>, RepositoryError> {
        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts \
             WHERE id_vehiculo = $1 AND activo = TRUE \
             ORDER BY descripcion_familia, descripcion_articulo"
        ))
        .bind(vehicle.id_local)
        .fetch_all(self.pool)
        .await?;
        Ok(parts)
    }

    /// Distinct brands of active parts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn brands(&self) -> Result<Vec<String>, RepositoryError> {
        self.distinct_text("vehicle_marca", None).await
    }

    /// Distinct models of active parts for a brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn models(&self, marca: &str) -> Result<Vec<String>, RepositoryError> {
        self.distinct_text("vehicle_modelo", Some(marca)).await
    }

    /// Distinct part families.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn families(&self) -> Result<Vec<String>, RepositoryError> {
        self.distinct_text("descripcion_familia", None).await
    }

    /// Distinct fuel types.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fuels(&self) -> Result<Vec<String>, RepositoryError> {
        self.distinct_text("combustible", None).await
    }

    /// Distinct donor vehicle years, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn years(&self) -> Result<Vec<i32>, RepositoryError> {
        let years = sqlx::query_scalar::<_, i32>(
            r"
            SELECT DISTINCT vehicle_anyo FROM parts
            WHERE activo = TRUE AND vehicle_anyo IS NOT NULL
            ORDER BY vehicle_anyo DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(years)
    }

    // `column` is always one of the literals above, never client input.
    async fn distinct_text(
        &self,
        column: &'static str,
        marca: Option<&str>,
    ) -> Result<Vec<String>, RepositoryError> {
        let values = sqlx::query_scalar::<_, String>(&format!(
            "SELECT DISTINCT {column} FROM parts \
             WHERE activo = TRUE AND {column} IS NOT NULL AND {column} <> '' \
             AND ($1::text IS NULL OR vehicle_marca ILIKE $1) \
             ORDER BY {column}"
        ))
        .bind(marca)
        .fetch_all(self.pool)
        .await?;
        Ok(values)
    }

    /// Active parts for the merchant feed, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn feed_parts(&self, limit: i64) -> Result<Vec<Part>, RepositoryError> {
        let parts = sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts \
             WHERE activo = TRUE AND precio > 0 \
             ORDER BY updated_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(parts)
    }

    /// Counts of active parts eligible for the merchant feed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn feed_stats(&self, placeholder_image: &str) -> Result<FeedStats, RepositoryError> {
        let stats = sqlx::query_as::<_, FeedStats>(
            r"
            WITH flags AS (
                SELECT precio > 0 AS priced,
                       EXISTS (
                           SELECT 1 FROM unnest(imagenes) AS img
                           WHERE img <> '' AND img <> $1
                       ) AS has_image
                FROM parts WHERE activo = TRUE
            )
            SELECT COUNT(*) AS total_parts,
                   COUNT(*) FILTER (WHERE priced AND has_image) AS valid_parts,
                   COUNT(*) FILTER (WHERE has_image) AS parts_with_images,
                   COUNT(*) FILTER (WHERE priced) AS parts_with_price
            FROM flags
            ",
        )
        .bind(placeholder_image)
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }
}
