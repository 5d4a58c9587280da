//! Unified error handling for admin.
//!
//! Every handler returns [`Result`]; errors reach the client as
//! `{"error": "..."}` and server-side failures are captured to Sentry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, BackupError, EmailError, ImportError, MetasyncError};

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Email could not be sent.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Backup operation failed.
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Import could not be started or cancelled.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation failed; every problem is reported.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Recurso no encontrado".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            "Error interno del servidor".to_string()
        }
    }
}

impl AppError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::NotStaff => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_)
                | AuthError::WeakPassword(_)
                | AuthError::MissingField(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Backup(err) => match err {
                BackupError::InvalidId => StatusCode::BAD_REQUEST,
                BackupError::NotFound => StatusCode::NOT_FOUND,
                BackupError::Io(_) | BackupError::Database(_) | BackupError::Restore(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Import(err) => match err {
                ImportError::NotConfigured => StatusCode::BAD_REQUEST,
                ImportError::AlreadyRunning(_) => StatusCode::CONFLICT,
                ImportError::Metasync(MetasyncError::NotConfigured) => StatusCode::BAD_REQUEST,
                ImportError::Metasync(_) => StatusCode::BAD_GATEWAY,
                ImportError::Repository(err) => repository_status(err),
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn client_message(&self) -> String {
        match self {
            Self::Database(err) => repository_message(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Credenciales incorrectas".to_string(),
                AuthError::NotStaff => "Acceso restringido al personal".to_string(),
                AuthError::UserNotFound => "Usuario no encontrado".to_string(),
                AuthError::UserAlreadyExists => {
                    "Ya existe una cuenta con ese usuario o email".to_string()
                }
                AuthError::InvalidEmail(_) => "Email no válido".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::MissingField(field) => format!("El campo {field} es obligatorio"),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Error de autenticación".to_string()
                }
            },
            Self::Email(_) => "No se pudo enviar el email".to_string(),
            Self::Backup(err) => match err {
                BackupError::InvalidId => "Identificador de backup no válido".to_string(),
                BackupError::NotFound => "Backup no encontrado".to_string(),
                BackupError::Restore(_) => "Error al restaurar el backup".to_string(),
                BackupError::Io(_) | BackupError::Database(_) => {
                    "Error al procesar el backup".to_string()
                }
            },
            Self::Import(err) => match err {
                ImportError::Repository(err) => repository_message(err),
                ImportError::Metasync(MetasyncError::NotConfigured) | ImportError::NotConfigured => {
                    "API de Metasync no configurada".to_string()
                }
                ImportError::Metasync(_) => "Error al contactar con Metasync".to_string(),
                ImportError::AlreadyRunning(_) => err.to_string(),
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Validation(_) => "Datos no válidos".to_string(),
            Self::Internal(_) => "Error interno del servidor".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let body = match &self {
            Self::Validation(errors) => json!({
                "error": self.client_message(),
                "errors": errors,
            }),
            _ => json!({ "error": self.client_message() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a staff user.
pub fn set_sentry_user(user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use desguace_core::ImportType;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("pedido 123".to_string());
        assert_eq!(err.to_string(), "Not found: pedido 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Validation(vec!["x".to_string()])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(get_status(AuthError::NotStaff.into()), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(RepositoryError::Conflict("slug".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(BackupError::InvalidId.into()), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(BackupError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(ImportError::AlreadyRunning(ImportType::Parts).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(ImportError::NotConfigured.into()), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Backup(BackupError::Restore("FATAL: password for user".to_string()));
        assert_eq!(err.client_message(), "Error al restaurar el backup");
        let err = AppError::Internal("connection refused".to_string());
        assert_eq!(err.client_message(), "Error interno del servidor");
    }
}
