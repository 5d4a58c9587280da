//! Database backups. Admin only.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::BackupInfo;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BackupCreated {
    pub message: &'static str,
    pub backup: BackupInfo,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<(StatusCode, Json<BackupCreated>)> {
    let backup = state.backups().create(state.pool()).await?;
    info!(backup_id = %backup.id, by = %admin.id, "Backup requested by admin");
    Ok((
        StatusCode::CREATED,
        Json(BackupCreated {
            message: "Backup creado correctamente",
            backup,
        }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<BackupInfo>>> {
    Ok(Json(state.backups().list().await?))
}

fn attachment(filename: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| AppError::Internal(format!("content-disposition: {e}")))
}

pub async fn download(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Response> {
    let (filename, stream) = state.backups().open(&id).await?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/sql"),
            ),
            (header::CONTENT_DISPOSITION, attachment(&filename)?),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    state.backups().delete(&id).await?;
    info!(backup_id = %id, by = %admin.id, "Backup deleted by admin");
    Ok(Json(Message {
        message: "Backup eliminado correctamente",
    }))
}

#[instrument(skip(state, admin))]
pub async fn restore(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    state.backups().restore(&id).await?;
    info!(backup_id = %id, by = %admin.id, "Backup restored");
    Ok(Json(Message {
        message: "Base de datos restaurada correctamente",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_header() {
        let value = attachment("backup-database-20250301-020000.sql").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"backup-database-20250301-020000.sql\""
        );
    }
}
