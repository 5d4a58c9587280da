//! Account management. Admin only.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use desguace_core::{Email, User, UserId, UserRole};

use crate::db::{Pagination, UserFilter, UserRepository, UserUpdate};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::{AuthService, NewAccount};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub nif_cif: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserPage>> {
    let page = Pagination::from_page(query.page, query.limit);
    let filter = UserFilter {
        search: query.search,
        role: query.role,
    };
    let (users, total) = UserRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(UserPage {
        users,
        total,
        page: query.page.filter(|p| *p > 0).unwrap_or(1),
        total_pages: page.total_pages(total),
    }))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))
}

#[instrument(skip(state, admin, request), fields(username = %request.username))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let account = NewAccount {
        username: request.username,
        email: request.email,
        password: request.password,
        role: request.role,
        first_name: request.first_name,
        last_name: request.last_name,
        phone: request.phone,
    };
    let user = AuthService::new(state.pool()).create_user(&account).await?;
    info!(user_id = %user.id, role = %user.role, by = %admin.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, admin, request))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    if id == admin.id && request.role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "No puedes quitarte el rol de administrador".to_string(),
        ));
    }
    let username = request.username.trim().to_owned();
    if username.is_empty() {
        return Err(AppError::BadRequest("El usuario es obligatorio".to_string()));
    }
    let email = Email::parse(&request.email)
        .map_err(|_| AppError::BadRequest("Email no válido".to_string()))?;

    let update = UserUpdate {
        username,
        email,
        role: request.role,
        first_name: request.first_name,
        last_name: request.last_name,
        phone: request.phone,
        address: request.address,
        city: request.city,
        postal_code: request.postal_code,
        province: request.province,
        nif_cif: request.nif_cif,
    };
    let user = UserRepository::new(state.pool()).update(id, &update).await?;
    info!(user_id = %user.id, role = %user.role, by = %admin.id, "User updated");
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    if id == admin.id {
        return Err(AppError::Forbidden(
            "No puedes eliminar tu propia cuenta".to_string(),
        ));
    }
    UserRepository::new(state.pool()).delete(id).await?;
    info!(user_id = %id, by = %admin.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_password(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(request): Json<PasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .set_password(id, &request.password)
        .await?;
    info!(user_id = %id, by = %admin.id, "Password reset");
    Ok(StatusCode::NO_CONTENT)
}
