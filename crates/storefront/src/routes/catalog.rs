//! Catalogue endpoints: parts, vehicles, filter facets and search.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use desguace_core::{Part, PartId, Vehicle, VehicleId};

use crate::db::{CatalogRepository, Pagination, PartFilter, VehicleFilter};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Pagination block of a list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl PageInfo {
    fn new(page: Pagination, total: i64) -> Self {
        Self {
            total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more(total),
        }
    }
}

/// A page of results.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

/// Query string of `GET /api/parts`.
#[derive(Debug, Default, Deserialize)]
pub struct PartsQuery {
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub familia: Option<String>,
    pub anyo: Option<i32>,
    pub combustible: Option<String>,
    pub search: Option<String>,
    pub vehicle_id: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PartsQuery {
    fn filter(&self) -> PartFilter {
        PartFilter {
            marca: self.marca.clone(),
            modelo: self.modelo.clone(),
            familia: self.familia.clone(),
            anyo: self.anyo,
            combustible: self.combustible.clone(),
            search: self.search.clone(),
            vehicle_id: self.vehicle_id.map(VehicleId::new),
        }
    }
}

/// Query string of `GET /api/vehicles`.
#[derive(Debug, Default, Deserialize)]
pub struct VehiclesQuery {
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub anyo: Option<i32>,
    pub combustible: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A vehicle with the parts still for sale.
#[derive(Debug, Serialize)]
pub struct VehicleDetail {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub marca: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// List active parts.
#[instrument(skip(state))]
pub async fn list_parts(
    State(state): State<AppState>,
    Query(query): Query<PartsQuery>,
) -> Result<Json<Paginated<Part>>> {
    let page = Pagination::new(query.limit, query.offset);
    let (data, total) = CatalogRepository::new(state.pool())
        .list_parts(&query.filter(), page)
        .await?;
    Ok(Json(Paginated {
        data,
        pagination: PageInfo::new(page, total),
    }))
}

/// One active part.
#[instrument(skip(state))]
pub async fn show_part(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Part>> {
    CatalogRepository::new(state.pool())
        .get_active_part(PartId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Pieza no encontrada".to_string()))
}

/// A part by its Metasync `RefLocal`.
#[instrument(skip(state))]
pub async fn part_by_ref(
    State(state): State<AppState>,
    Path(ref_local): Path<i64>,
) -> Result<Json<Part>> {
    CatalogRepository::new(state.pool())
        .get_by_ref_local(ref_local)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Pieza no encontrada".to_string()))
}

/// List active vehicles.
#[instrument(skip(state))]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<Paginated<Vehicle>>> {
    let page = Pagination::new(query.limit, query.offset);
    let filter = VehicleFilter {
        marca: query.marca,
        modelo: query.modelo,
        anyo: query.anyo,
        combustible: query.combustible,
        search: query.search,
    };
    let (data, total) = CatalogRepository::new(state.pool())
        .list_vehicles(&filter, page)
        .await?;
    Ok(Json(Paginated {
        data,
        pagination: PageInfo::new(page, total),
    }))
}

/// A vehicle and its active parts.
#[instrument(skip(state))]
pub async fn show_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<VehicleDetail>> {
    let repo = CatalogRepository::new(state.pool());
    let vehicle = repo
        .get_vehicle(VehicleId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Vehículo no encontrado".to_string()))?;
    let parts = repo.vehicle_parts(&vehicle).await?;
    Ok(Json(VehicleDetail { vehicle, parts }))
}

// =============================================================================
// Filters
// =============================================================================

pub async fn brands(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(CatalogRepository::new(state.pool()).brands().await?))
}

/// Models of one brand. Without a brand the list is empty.
pub async fn models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<Vec<String>>> {
    let Some(marca) = query.marca.filter(|m| !m.trim().is_empty()) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(CatalogRepository::new(state.pool()).models(&marca).await?))
}

pub async fn families(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(CatalogRepository::new(state.pool()).families().await?))
}

pub async fn years(State(state): State<AppState>) -> Result<Json<Vec<i32>>> {
    Ok(Json(CatalogRepository::new(state.pool()).years().await?))
}

pub async fn fuels(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(CatalogRepository::new(state.pool()).fuels().await?))
}

/// Quick search over descriptions, references and vehicle names.
#[instrument(skip(state))]
pub async fn search_parts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Part>>> {
    let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(CatalogRepository::new(state.pool()).search_parts(q).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info_has_more() {
        let page = Pagination::new(Some(24), Some(0));
        let info = PageInfo::new(page, 30);
        assert!(info.has_more);
        assert_eq!(info.limit, 24);

        let last = PageInfo::new(Pagination::new(Some(24), Some(24)), 30);
        assert!(!last.has_more);
    }

    #[test]
    fn test_parts_query_maps_vehicle_id() {
        let query = PartsQuery {
            vehicle_id: Some(9),
            familia: Some("MOTOR".into()),
            ..PartsQuery::default()
        };
        let filter = query.filter();
        assert_eq!(filter.vehicle_id, Some(VehicleId::new(9)));
        assert_eq!(filter.familia.as_deref(), Some("MOTOR"));
    }
}
