//! Customer authentication endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use desguace_core::User;

use crate::db::CartRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, Shopper, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Registration form data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            confirm_password: req.confirm_password,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            address: req.address,
            city: req.city,
            postal_code: req.postal_code,
            province: req.province,
        }
    }
}

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

/// Put the user in the session and move the guest cart over.
async fn start_session(state: &AppState, shopper: &Shopper, user: &User) -> Result<()> {
    set_current_user(&shopper.session, &CurrentUser::from(user))
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    if let Err(e) = CartRepository::new(state.pool())
        .merge_guest(&shopper.token, user.id)
        .await
    {
        warn!(user_id = %user.id, error = %e, "Guest cart merge failed");
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create a customer account and log it in.
#[instrument(skip(state, shopper, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(&request.into())
        .await?;
    start_session(&state, &shopper, &user).await?;
    info!(user_id = %user.id, "Customer registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, shopper, request))]
pub async fn login(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(request): Json<LoginRequest>,
) -> Result<Json<User>> {
    let identifier = request
        .identifier()
        .ok_or_else(|| AppError::BadRequest("Usuario o email obligatorio".to_string()))?;
    let user = AuthService::new(state.pool())
        .login(identifier, &request.password)
        .await?;
    start_session(&state, &shopper, &user).await?;
    info!(user_id = %user.id, "Customer logged in");
    Ok(Json(user))
}

pub async fn logout(shopper: Shopper) -> Result<StatusCode> {
    clear_current_user(&shopper.session)
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(AuthService::new(state.pool()).get_user(current.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_identifier_prefers_username() {
        let req = LoginRequest {
            username: Some(" pepe ".into()),
            email: Some("pepe@example.com".into()),
            password: "x".into(),
        };
        assert_eq!(req.identifier(), Some("pepe"));

        let req = LoginRequest {
            username: None,
            email: Some("pepe@example.com".into()),
            password: "x".into(),
        };
        assert_eq!(req.identifier(), Some("pepe@example.com"));

        let req = LoginRequest {
            username: Some("  ".into()),
            email: None,
            password: "x".into(),
        };
        assert_eq!(req.identifier(), None);
    }
}
