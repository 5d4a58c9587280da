//! Pop-ups shown on the public site.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use desguace_core::{Popup, PopupAction, PopupId};

use crate::db::{NewPopupStat, PopupRepository};
use crate::error::{AppError, Result};
use crate::middleware::{Shopper, client_ip};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRequest {
    pub action: Option<PopupAction>,
    pub page: Option<String>,
    pub session_id: Option<String>,
}

/// Keep the live pop-ups that apply to `page`.
fn for_page(popups: Vec<Popup>, page: &str) -> Vec<Popup> {
    let now = Utc::now();
    popups
        .into_iter()
        .filter(|p| p.is_live_at(now) && p.targets_page(page))
        .collect()
}

/// Pop-ups for a page, highest priority first.
pub async fn active(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Vec<Popup>>> {
    let page = query.page.unwrap_or_else(|| "/".to_owned());
    let popups = PopupRepository::new(state.pool()).live().await?;
    Ok(Json(for_page(popups, &page)))
}

/// Log a view, close, click or dismissal.
#[instrument(skip(state, shopper, headers, request))]
pub async fn record_stat(
    State(state): State<AppState>,
    shopper: Shopper,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(request): Json<StatRequest>,
) -> Result<StatusCode> {
    let (Some(action), Some(page)) = (
        request.action,
        request.page.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Acción y página son obligatorias".to_string(),
        ));
    };

    let popup_id = PopupId::new(id);
    let repo = PopupRepository::new(state.pool());
    if !repo.exists(popup_id).await? {
        return Err(AppError::NotFound("Popup no encontrado".to_string()));
    }

    repo.record_stat(&NewPopupStat {
        popup_id,
        user_id: shopper.user_id(),
        session_id: request.session_id.or(Some(shopper.token)),
        action,
        page_url: page,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        ip_address: client_ip(&headers).map(|ip| ip.to_string()),
    })
    .await?;
    Ok(StatusCode::CREATED)
}
