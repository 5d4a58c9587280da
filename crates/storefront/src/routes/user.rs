//! Customer panel: profile, password and permissions.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use desguace_core::{User, UserRole};

use crate::db::{ProfileUpdate, UserRepository};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub nif_cif: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

impl From<ProfileRequest> for ProfileUpdate {
    fn from(req: ProfileRequest) -> Self {
        Self {
            first_name: clean(req.first_name),
            last_name: clean(req.last_name),
            phone: clean(req.phone),
            address: clean(req.address),
            city: clean(req.city),
            postal_code: clean(req.postal_code),
            province: clean(req.province),
            nif_cif: clean(req.nif_cif).map(|n| n.to_uppercase()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// What the signed-in user may do.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub role: UserRole,
    pub can_access_admin: bool,
    pub can_manage_orders: bool,
    pub can_manage_users: bool,
}

impl From<UserRole> for Permissions {
    fn from(role: UserRole) -> Self {
        Self {
            role,
            can_access_admin: role.is_staff(),
            can_manage_orders: role.at_least(UserRole::Manager),
            can_manage_users: role.at_least(UserRole::Admin),
        }
    }
}

pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(AuthService::new(state.pool()).get_user(current.id).await?))
}

#[instrument(skip(state, current, request), fields(user_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &request.into())
        .await?;
    info!("Profile updated");
    Ok(Json(user))
}

#[instrument(skip(state, current, request), fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(request): Json<PasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(current.id, &request.current_password, &request.new_password)
        .await?;
    info!("Password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn permissions(RequireAuth(current): RequireAuth) -> Json<Permissions> {
    Json(Permissions::from(current.role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_by_role() {
        let customer = Permissions::from(UserRole::Customer);
        assert!(!customer.can_access_admin);
        assert!(!customer.can_manage_orders);

        let manager = Permissions::from(UserRole::Manager);
        assert!(manager.can_access_admin);
        assert!(manager.can_manage_orders);
        assert!(!manager.can_manage_users);

        assert!(Permissions::from(UserRole::Admin).can_manage_users);
    }

    #[test]
    fn test_profile_request_trims_and_uppercases_nif() {
        let update = ProfileUpdate::from(ProfileRequest {
            first_name: Some("  Ana ".into()),
            phone: Some("   ".into()),
            nif_cif: Some("12345678z".into()),
            ..ProfileRequest::default()
        });
        assert_eq!(update.first_name.as_deref(), Some("Ana"));
        assert_eq!(update.phone, None);
        assert_eq!(update.nif_cif.as_deref(), Some("12345678Z"));
    }
}
