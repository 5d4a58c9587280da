//! CMS content editing: pages, homepage and footer blocks, settings and the
//! maintenance switch.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use desguace_core::{
    FooterBlock, FooterBlockId, HomepageBlock, HomepageBlockId, Page, PageId, SiteConfig,
    SiteSetting,
};

use crate::db::{CmsRepository, FooterBlockInput, HomepageBlockInput, PageInput};
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::state::AppState;

fn validate_page(input: &PageInput) -> Vec<String> {
    let mut errors = Vec::new();
    if input.title.trim().is_empty() {
        errors.push("El título es obligatorio".to_owned());
    }
    let slug = input.slug.trim();
    if slug.is_empty() {
        errors.push("El slug es obligatorio".to_owned());
    } else if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        errors.push("El slug solo puede contener minúsculas, números y guiones".to_owned());
    }
    errors
}

fn check_page(mut input: PageInput) -> Result<PageInput> {
    input.slug = input.slug.trim().to_owned();
    let errors = validate_page(&input);
    if errors.is_empty() {
        Ok(input)
    } else {
        Err(AppError::Validation(errors))
    }
}

// ===== Pages =====

pub async fn pages(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<Page>>> {
    Ok(Json(CmsRepository::new(state.pool()).pages().await?))
}

pub async fn page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<PageId>,
) -> Result<Json<Page>> {
    CmsRepository::new(state.pool())
        .page(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Página no encontrada".to_string()))
}

pub async fn create_page(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(input): Json<PageInput>,
) -> Result<(StatusCode, Json<Page>)> {
    let input = check_page(input)?;
    let page = CmsRepository::new(state.pool()).create_page(&input).await?;
    info!(page_id = %page.id, slug = %page.slug, by = %staff.id, "Page created");
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn update_page(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<PageId>,
    Json(input): Json<PageInput>,
) -> Result<Json<Page>> {
    let input = check_page(input)?;
    Ok(Json(
        CmsRepository::new(state.pool()).update_page(id, &input).await?,
    ))
}

/// System pages refuse deletion with 409.
pub async fn delete_page(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<PageId>,
) -> Result<StatusCode> {
    CmsRepository::new(state.pool()).delete_page(id).await?;
    info!(page_id = %id, by = %staff.id, "Page deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ===== Homepage blocks =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPosition {
    pub id: HomepageBlockId,
    pub sort_order: i32,
}

pub async fn homepage_blocks(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<HomepageBlock>>> {
    Ok(Json(CmsRepository::new(state.pool()).homepage_blocks().await?))
}

pub async fn create_homepage_block(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(input): Json<HomepageBlockInput>,
) -> Result<(StatusCode, Json<HomepageBlock>)> {
    if input.block_type.trim().is_empty() {
        return Err(AppError::BadRequest("El tipo de bloque es obligatorio".to_string()));
    }
    let block = CmsRepository::new(state.pool())
        .create_homepage_block(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(block)))
}

pub async fn update_homepage_block(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<HomepageBlockId>,
    Json(input): Json<HomepageBlockInput>,
) -> Result<Json<HomepageBlock>> {
    Ok(Json(
        CmsRepository::new(state.pool())
            .update_homepage_block(id, &input)
            .await?,
    ))
}

pub async fn delete_homepage_block(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<HomepageBlockId>,
) -> Result<StatusCode> {
    CmsRepository::new(state.pool())
        .delete_homepage_block(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder_homepage_blocks(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(positions): Json<Vec<BlockPosition>>,
) -> Result<StatusCode> {
    let order: Vec<(HomepageBlockId, i32)> =
        positions.iter().map(|p| (p.id, p.sort_order)).collect();
    CmsRepository::new(state.pool())
        .reorder_homepage_blocks(&order)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Footer blocks =====

pub async fn footer_blocks(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<FooterBlock>>> {
    Ok(Json(CmsRepository::new(state.pool()).footer_blocks().await?))
}

pub async fn create_footer_block(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(input): Json<FooterBlockInput>,
) -> Result<(StatusCode, Json<FooterBlock>)> {
    if input.title.trim().is_empty() {
        return Err(AppError::BadRequest("El título es obligatorio".to_string()));
    }
    let block = CmsRepository::new(state.pool())
        .create_footer_block(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(block)))
}

pub async fn update_footer_block(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<FooterBlockId>,
    Json(input): Json<FooterBlockInput>,
) -> Result<Json<FooterBlock>> {
    Ok(Json(
        CmsRepository::new(state.pool())
            .update_footer_block(id, &input)
            .await?,
    ))
}

pub async fn delete_footer_block(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<FooterBlockId>,
) -> Result<StatusCode> {
    CmsRepository::new(state.pool())
        .delete_footer_block(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Settings =====

/// Setting values are stored as text; non-string JSON is kept in its JSON form.
fn setting_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub async fn settings(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<BTreeMap<String, Vec<SiteSetting>>>> {
    Ok(Json(
        CmsRepository::new(state.pool())
            .settings_by_category()
            .await?,
    ))
}

pub async fn update_settings(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(values): Json<BTreeMap<String, Value>>,
) -> Result<Json<BTreeMap<String, Vec<SiteSetting>>>> {
    let values: BTreeMap<String, String> = values
        .into_iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key, setting_value(value)))
        .collect();
    let cms = CmsRepository::new(state.pool());
    cms.upsert_settings(&values).await?;
    info!(count = values.len(), by = %staff.id, "Settings updated");
    Ok(Json(cms.settings_by_category().await?))
}

pub async fn update_site_config(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(config): Json<SiteConfig>,
) -> Result<Json<SiteConfig>> {
    CmsRepository::new(state.pool())
        .set_site_config(&config)
        .await?;
    info!(maintenance = config.maintenance_mode, by = %staff.id, "Site config updated");
    Ok(Json(config))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn page_input(slug: &str, title: &str) -> PageInput {
        PageInput {
            slug: slug.to_owned(),
            title: title.to_owned(),
            content: String::new(),
            meta_title: None,
            meta_description: None,
            is_published: true,
        }
    }

    #[test]
    fn test_page_validation() {
        assert!(validate_page(&page_input("aviso-legal", "Aviso legal")).is_empty());
        assert_eq!(validate_page(&page_input("", "")).len(), 2);
        assert_eq!(validate_page(&page_input("Aviso Legal", "Aviso")).len(), 1);
    }

    #[test]
    fn test_setting_values_are_text() {
        assert_eq!(setting_value(json!("hola")), "hola");
        assert_eq!(setting_value(json!(true)), "true");
        assert_eq!(setting_value(json!(21)), "21");
        assert_eq!(setting_value(Value::Null), "");
    }
}
