//! Authentication middleware and extractors for the back-office.
//!
//! Provides extractors for requiring staff or admin authentication in route
//! handlers. Every back-office route is an API route, so rejections are JSON.
//!
//! The session only names the user. Each request re-reads the account, so a
//! deleted or demoted staff member loses access on their next request.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use desguace_core::{User, UserRole};

use crate::db::UserRepository;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a manager or admin session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireStaff(staff): RequireStaff,
/// ) -> impl IntoResponse {
///     format!("Hola, {}!", staff.username)
/// }
/// ```
pub struct RequireStaff(pub CurrentUser);

/// Error returned when staff authentication is required.
#[derive(Debug)]
pub enum StaffRejection {
    /// No session layer is installed or the session could not be read.
    SessionUnavailable,
    /// The account behind the session could not be loaded.
    LookupFailed,
    /// Not logged in.
    Unauthorized,
    /// Logged in, but the role is too low for this resource.
    Forbidden,
}

impl IntoResponse for StaffRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::SessionUnavailable | Self::LookupFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "No autenticado"),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "No tienes permisos para acceder a este recurso",
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Check the stored account behind a session against `role`.
///
/// A missing account is treated as logged out.
fn authorize(stored: Option<&User>, role: UserRole) -> Result<CurrentUser, StaffRejection> {
    let user = stored.ok_or(StaffRejection::Unauthorized)?;
    if !user.role.at_least(role) {
        return Err(StaffRejection::Forbidden);
    }
    Ok(CurrentUser::from(user))
}

/// Read the session user, reload the account and check it holds at least
/// `role`.
async fn staff_with_role(
    parts: &Parts,
    state: &AppState,
    role: UserRole,
) -> Result<CurrentUser, StaffRejection> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(StaffRejection::SessionUnavailable)?;

    let snapshot: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or(StaffRejection::Unauthorized)?;

    let stored = UserRepository::new(state.pool())
        .get_by_id(snapshot.id)
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = %snapshot.id, "Failed to reload session user");
            StaffRejection::LookupFailed
        })?;

    if stored.is_none() {
        info!(user_id = %snapshot.id, "Session user no longer exists, ending session");
        if let Err(e) = session.flush().await {
            warn!(error = %e, "Failed to end stale session");
        }
    }
    let user = authorize(stored.as_ref(), role)?;
    if user.role != snapshot.role {
        if let Err(e) = session.insert(session_keys::CURRENT_USER, &user).await {
            warn!(error = %e, "Failed to refresh session role");
        }
    }
    Ok(user)
}

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = StaffRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        staff_with_role(parts, &state, UserRole::Manager).await.map(Self)
    }
}

/// Extractor that requires an admin session.
///
/// Managers get 403 Forbidden.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = StaffRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        staff_with_role(parts, &state, UserRole::Admin).await.map(Self)
    }
}

/// Helper to set the current staff member in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to end the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};

    use desguace_core::{Email, UserId};

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(4),
            username: "marta".into(),
            email: Email::parse("marta@desguacesmurcia.com").unwrap(),
            role,
            first_name: None,
            last_name: None,
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            province: None,
            country: None,
            nif_cif: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_current_role_grants_access() {
        let staff = authorize(Some(&user(UserRole::Admin)), UserRole::Manager).unwrap();
        assert_eq!(staff.role, UserRole::Admin);
        assert_eq!(staff.username, "marta");
        assert!(authorize(Some(&user(UserRole::Manager)), UserRole::Manager).is_ok());
    }

    #[test]
    fn test_deleted_user_is_logged_out() {
        assert!(matches!(
            authorize(None, UserRole::Manager),
            Err(StaffRejection::Unauthorized)
        ));
    }

    #[test]
    fn test_demoted_user_loses_access() {
        assert!(matches!(
            authorize(Some(&user(UserRole::Manager)), UserRole::Admin),
            Err(StaffRejection::Forbidden)
        ));
        assert!(matches!(
            authorize(Some(&user(UserRole::Customer)), UserRole::Manager),
            Err(StaffRejection::Forbidden)
        ));
    }
}
