//! Pop-up management and interaction statistics.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use desguace_core::{ButtonAction, Popup, PopupId};

use crate::db::{PopupInput, PopupRepository, PopupStatCounts};
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::state::AppState;

/// Interaction counts with click and close rates as percentages of views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupStats {
    pub popup_id: PopupId,
    pub views: i64,
    pub clicks: i64,
    pub closes: i64,
    pub ignored: i64,
    pub click_rate: Decimal,
    pub close_rate: Decimal,
}

/// `part / views` as a percentage rounded to two decimals; 0 without views.
fn rate(part: i64, views: i64) -> Decimal {
    if views <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(views)).round_dp(2)
}

impl PopupStats {
    fn new(popup_id: PopupId, counts: PopupStatCounts) -> Self {
        Self {
            popup_id,
            views: counts.views,
            clicks: counts.clicks,
            closes: counts.closes,
            ignored: counts.ignored,
            click_rate: rate(counts.clicks, counts.views),
            close_rate: rate(counts.closes, counts.views),
        }
    }
}

/// Every problem with a pop-up form.
fn validate(input: &PopupInput) -> Vec<String> {
    let mut errors = Vec::new();
    if input.title.trim().is_empty() {
        errors.push("El título es obligatorio".to_owned());
    }
    if input.content.trim().is_empty() {
        errors.push("El contenido es obligatorio".to_owned());
    }
    if let (Some(start), Some(end)) = (input.start_date, input.end_date)
        && end <= start
    {
        errors.push("La fecha de fin debe ser posterior a la de inicio".to_owned());
    }
    if input.trigger_value < 0 {
        errors.push("El valor del disparador no puede ser negativo".to_owned());
    }
    if input.button_action == ButtonAction::Redirect
        && input
            .button_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    {
        errors.push("La URL del botón es obligatoria para redirigir".to_owned());
    }
    errors
}

fn check(input: &PopupInput) -> Result<()> {
    let errors = validate(input);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<Popup>>> {
    Ok(Json(PopupRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<PopupId>,
) -> Result<Json<Popup>> {
    PopupRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Pop-up no encontrado".to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(input): Json<PopupInput>,
) -> Result<(StatusCode, Json<Popup>)> {
    check(&input)?;
    let popup = PopupRepository::new(state.pool()).create(&input).await?;
    info!(popup_id = %popup.id, by = %staff.id, "Popup created");
    Ok((StatusCode::CREATED, Json(popup)))
}

pub async fn update(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<PopupId>,
    Json(input): Json<PopupInput>,
) -> Result<Json<Popup>> {
    check(&input)?;
    Ok(Json(PopupRepository::new(state.pool()).update(id, &input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<PopupId>,
) -> Result<StatusCode> {
    PopupRepository::new(state.pool()).delete(id).await?;
    info!(popup_id = %id, by = %staff.id, "Popup deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<PopupId>,
) -> Result<Json<Popup>> {
    Ok(Json(PopupRepository::new(state.pool()).toggle(id).await?))
}

pub async fn stats(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<PopupId>,
) -> Result<Json<PopupStats>> {
    let repo = PopupRepository::new(state.pool());
    if repo.get(id).await?.is_none() {
        return Err(AppError::NotFound("Pop-up no encontrado".to_string()));
    }
    let counts = repo
        .stat_counts(Some(id))
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(Json(PopupStats::new(id, counts)))
}

/// Stats for every pop-up, including ones never shown.
pub async fn all_stats(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<PopupStats>>> {
    let repo = PopupRepository::new(state.pool());
    let popups = repo.list().await?;
    let mut counts = repo.stat_counts(None).await?;
    Ok(Json(
        popups
            .iter()
            .map(|p| PopupStats::new(p.id, counts.remove(&p.id).unwrap_or_default()))
            .collect(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use desguace_core::{DisplayFrequency, PopupTrigger, PopupType};

    use super::*;

    fn input() -> PopupInput {
        PopupInput {
            title: "Oferta".into(),
            content: "10% en motores".into(),
            popup_type: PopupType::Promotion,
            trigger_type: PopupTrigger::Delay,
            trigger_value: 5,
            display_frequency: DisplayFrequency::Once,
            target_pages: vec![],
            exclude_pages: vec![],
            start_date: None,
            end_date: None,
            is_active: true,
            show_close_button: true,
            button_text: None,
            button_url: None,
            button_action: ButtonAction::Close,
            priority: 0,
        }
    }

    #[test]
    fn test_rates() {
        assert_eq!(rate(0, 0), Decimal::ZERO);
        assert_eq!(rate(1, 3), Decimal::new(3333, 2));
        assert_eq!(rate(2, 8), Decimal::new(25, 0));
    }

    #[test]
    fn test_valid_popup() {
        assert!(validate(&input()).is_empty());
    }

    #[test]
    fn test_invalid_popup_reports_every_problem() {
        let mut popup = input();
        popup.title = " ".into();
        popup.content = String::new();
        popup.trigger_value = -1;
        popup.start_date = Some(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        popup.end_date = Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        popup.button_action = ButtonAction::Redirect;
        assert_eq!(validate(&popup).len(), 5);
    }

    #[test]
    fn test_input_defaults_from_json() {
        let popup: PopupInput = serde_json::from_str(
            r#"{"title":"Hola","content":"Texto","popupType":"info","triggerType":"immediate",
                "displayFrequency":"always","buttonAction":"close"}"#,
        )
        .unwrap();
        assert!(popup.is_active);
        assert!(popup.show_close_button);
        assert!(popup.target_pages.is_empty());
    }
}
