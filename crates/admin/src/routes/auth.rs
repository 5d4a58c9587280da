//! Staff login and logout.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use desguace_core::User;

use crate::db::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireStaff, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::AuthService;
use crate::state::AppState;

/// Login form data. Either field identifies the account.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

impl LoginRequest {
    fn identifier(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<User>> {
    let identifier = request
        .identifier()
        .ok_or_else(|| AppError::BadRequest("Usuario o email obligatorio".to_string()))?;
    let user = AuthService::new(state.pool())
        .login_staff(identifier, &request.password)
        .await?;

    set_current_user(&session, &CurrentUser::from(&user))
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    set_sentry_user(user.id.as_i32(), Some(user.email.as_str()));
    info!(user_id = %user.id, role = %user.role, "Staff logged in");
    Ok(Json(user))
}

pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in staff member, fresh from the database.
pub async fn me(
    State(state): State<AppState>,
    RequireStaff(current): RequireStaff,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Sesión no válida".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_identifier() {
        let req = LoginRequest {
            username: None,
            email: Some(" admin@desguacesmurcia.com ".into()),
            password: "x".into(),
        };
        assert_eq!(req.identifier(), Some("admin@desguacesmurcia.com"));

        let req = LoginRequest {
            username: Some(String::new()),
            email: None,
            password: "x".into(),
        };
        assert_eq!(req.identifier(), None);
    }
}
