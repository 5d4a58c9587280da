//! Metasync imports: API credentials, manual runs, history and schedules.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span};

use desguace_core::payment::config::SECRET_MASK;
use desguace_core::{
    ApiConfig, ImportHistory, ImportHistoryId, ImportSchedule, ImportScheduleId, ImportType,
};

use crate::db::ImportRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::middleware::request_id::RequestId;
use crate::services::scheduler::{MAX_FREQUENCY_VALUE, next_run_from_now, parse_frequency, parse_start_time};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 200;

// ===== API config =====

fn mask_key(mut config: ApiConfig) -> ApiConfig {
    if !config.api_key.is_empty() && config.api_key != ApiConfig::PLACEHOLDER_KEY {
        config.api_key = SECRET_MASK.to_owned();
    }
    config
}

/// A masked or blank key in an edit keeps the stored one.
fn merge_key(mut incoming: ApiConfig, stored: &ApiConfig) -> ApiConfig {
    let key = incoming.api_key.trim();
    if key.is_empty() || key == SECRET_MASK {
        incoming.api_key.clone_from(&stored.api_key);
    } else {
        incoming.api_key = key.to_owned();
    }
    incoming.channel = incoming.channel.trim().to_owned();
    incoming
}

pub async fn config(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<ApiConfig>> {
    let config = ImportRepository::new(state.pool()).api_config().await?;
    Ok(Json(mask_key(config)))
}

pub async fn update_config(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(incoming): Json<ApiConfig>,
) -> Result<Json<ApiConfig>> {
    let repo = ImportRepository::new(state.pool());
    let stored = repo.api_config().await?;
    let config = merge_key(incoming, &stored);
    if config.company_id <= 0 {
        return Err(AppError::BadRequest("El id de empresa debe ser positivo".to_string()));
    }
    let saved = repo.save_api_config(&config).await?;
    info!(company_id = saved.company_id, active = saved.active, by = %staff.id, "Import API config updated");
    Ok(Json(mask_key(saved)))
}

// ===== Runs and history =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(rename = "type")]
    pub import_type: ImportType,
    #[serde(default)]
    pub full_import: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    pub history_id: ImportHistoryId,
    pub history: ImportHistory,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

fn history_limit(limit: Option<i64>) -> i64 {
    limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT)
}

pub async fn run(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunStarted>)> {
    let span = info_span!(
        "import_run",
        request_id = %request_id.0,
        import_type = %request.import_type,
        full = request.full_import,
    );
    let history = state
        .imports()
        .start(request.import_type, request.full_import)
        .instrument(span)
        .await?;
    info!(history_id = %history.id, by = %staff.id, "Manual import requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted {
            history_id: history.id,
            history,
        }),
    ))
}

pub async fn history(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ImportHistory>>> {
    Ok(Json(
        ImportRepository::new(state.pool())
            .recent_history(history_limit(query.limit))
            .await?,
    ))
}

pub async fn history_entry(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ImportHistoryId>,
) -> Result<Json<ImportHistory>> {
    ImportRepository::new(state.pool())
        .history(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Importación no encontrada".to_string()))
}

pub async fn cancel(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ImportHistoryId>,
) -> Result<Json<ImportHistory>> {
    let history = state.imports().cancel(id).await?;
    info!(history_id = %id, by = %staff.id, "Import cancel requested");
    Ok(Json(history))
}

// ===== Schedules =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub import_type: Option<ImportType>,
    pub frequency: String,
    pub start_time: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Trimmed frequency and start time, or every problem with them.
fn check_schedule(request: &ScheduleRequest) -> Result<(String, Option<String>)> {
    let mut errors = Vec::new();
    let frequency = request.frequency.trim().to_lowercase();
    if parse_frequency(&frequency).is_none() {
        errors.push(format!(
            "Frecuencia no válida: use un número de 1 a {MAX_FREQUENCY_VALUE} seguido de m, h, d o w"
        ));
    }
    let start_time = request
        .start_time
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    if let Some(start) = &start_time
        && parse_start_time(start).is_none()
    {
        errors.push("La hora de inicio debe tener el formato HH:MM".to_owned());
    }
    if errors.is_empty() {
        Ok((frequency, start_time))
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn schedules(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<ImportSchedule>>> {
    Ok(Json(ImportRepository::new(state.pool()).schedules().await?))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ImportSchedule>)> {
    let import_type = request
        .import_type
        .ok_or_else(|| AppError::BadRequest("El tipo de importación es obligatorio".to_string()))?;
    let (frequency, start_time) = check_schedule(&request)?;
    let next_run = next_run_from_now(&frequency, start_time.as_deref());
    let schedule = ImportRepository::new(state.pool())
        .create_schedule(
            import_type,
            &frequency,
            start_time.as_deref(),
            request.is_active,
            next_run,
        )
        .await?;
    info!(schedule_id = %schedule.id, %import_type, %frequency, by = %staff.id, "Import schedule created");
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ImportScheduleId>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ImportSchedule>> {
    let (frequency, start_time) = check_schedule(&request)?;
    let next_run = next_run_from_now(&frequency, start_time.as_deref());
    let schedule = ImportRepository::new(state.pool())
        .update_schedule(
            id,
            &frequency,
            start_time.as_deref(),
            request.is_active,
            next_run,
        )
        .await?;
    info!(schedule_id = %id, %frequency, active = schedule.is_active, by = %staff.id, "Import schedule updated");
    Ok(Json(schedule))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ImportScheduleId>,
) -> Result<StatusCode> {
    ImportRepository::new(state.pool())
        .delete_schedule(id)
        .await?;
    info!(schedule_id = %id, by = %staff.id, "Import schedule deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn api_config(key: &str) -> ApiConfig {
        ApiConfig {
            api_key: key.to_owned(),
            company_id: 42,
            channel: "web".to_owned(),
            active: true,
        }
    }

    fn schedule(frequency: &str, start: Option<&str>) -> ScheduleRequest {
        ScheduleRequest {
            import_type: Some(ImportType::Parts),
            frequency: frequency.to_owned(),
            start_time: start.map(str::to_owned),
            is_active: true,
        }
    }

    #[test]
    fn test_key_is_masked() {
        assert_eq!(mask_key(api_config("secret")).api_key, SECRET_MASK);
        assert_eq!(
            mask_key(api_config(ApiConfig::PLACEHOLDER_KEY)).api_key,
            ApiConfig::PLACEHOLDER_KEY
        );
        assert_eq!(mask_key(api_config("")).api_key, "");
    }

    #[test]
    fn test_masked_key_keeps_stored() {
        let stored = api_config("real-key");
        assert_eq!(merge_key(api_config(SECRET_MASK), &stored).api_key, "real-key");
        assert_eq!(merge_key(api_config(" "), &stored).api_key, "real-key");
        assert_eq!(merge_key(api_config(" new "), &stored).api_key, "new");
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(Some(0)), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(Some(5)), 5);
        assert_eq!(history_limit(Some(10_000)), MAX_HISTORY_LIMIT);
    }

    #[test]
    fn test_schedule_validation() {
        let (frequency, start) = check_schedule(&schedule(" 12H ", Some("02:30"))).unwrap();
        assert_eq!(frequency, "12h");
        assert_eq!(start.as_deref(), Some("02:30"));

        let (_, start) = check_schedule(&schedule("1d", Some(""))).unwrap();
        assert_eq!(start, None);

        let err = check_schedule(&schedule("200h", Some("25:00"))).unwrap_err();
        assert!(matches!(err, AppError::Validation(errors) if errors.len() == 2));
    }

    #[test]
    fn test_run_request() {
        let request: RunRequest =
            serde_json::from_str(r#"{"type":"vehicles","fullImport":true}"#).unwrap();
        assert_eq!(request.import_type, ImportType::Vehicles);
        assert!(request.full_import);
    }
}
