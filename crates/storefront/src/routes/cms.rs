//! Public CMS content.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
};

use desguace_core::models::cms::{MAINTENANCE_MESSAGE_KEY, MAINTENANCE_MODE_KEY};
use desguace_core::{FooterBlock, HomepageBlock, Page, SiteConfig};

use crate::db::CmsRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// A published page.
pub async fn page(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Page>> {
    CmsRepository::new(state.pool())
        .published_page(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Página no encontrada".to_string()))
}

pub async fn homepage_blocks(State(state): State<AppState>) -> Result<Json<Vec<HomepageBlock>>> {
    Ok(Json(
        CmsRepository::new(state.pool())
            .active_homepage_blocks()
            .await?,
    ))
}

pub async fn footer_blocks(State(state): State<AppState>) -> Result<Json<Vec<FooterBlock>>> {
    Ok(Json(
        CmsRepository::new(state.pool()).active_footer_blocks().await?,
    ))
}

/// Public settings as a key/value map.
pub async fn settings(State(state): State<AppState>) -> Result<Json<BTreeMap<String, String>>> {
    Ok(Json(CmsRepository::new(state.pool()).public_settings().await?))
}

/// Maintenance switch, polled by the SPA on load.
pub async fn site_config(State(state): State<AppState>) -> Result<Json<SiteConfig>> {
    let cms = CmsRepository::new(state.pool());
    let mode = cms.setting(MAINTENANCE_MODE_KEY).await?;
    let message = cms.setting(MAINTENANCE_MESSAGE_KEY).await?;
    Ok(Json(SiteConfig::from_settings(
        mode.as_deref(),
        message.as_deref(),
    )))
}
