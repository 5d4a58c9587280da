//! Staff user management.
//!
//! # Usage
//!
//! ```bash
//! # Create the first administrator
//! dsg-cli admin create -u admin -e admin@desguacesmurcia.com -p 'a long password'
//!
//! # Create a manager
//! dsg-cli admin create -u tienda -e tienda@desguacesmurcia.com -p '...' -r manager
//! ```

use desguace_admin::db;
use desguace_admin::services::{AuthError, AuthService, NewAccount};
use desguace_core::{User, UserRole};
use thiserror::Error;

/// Errors that can occur during staff user operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Staff accounts are managers or admins.
    #[error("Invalid role: {0}. Valid roles: admin, manager")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Config(String),
}

/// Parse a staff role. Customers are created through the shop.
fn staff_role(role: &str) -> Result<UserRole, AdminError> {
    match role.trim().parse::<UserRole>() {
        Ok(role) if role != UserRole::Customer => Ok(role),
        _ => Err(AdminError::InvalidRole(role.to_owned())),
    }
}

/// Create a staff user with a password.
///
/// # Errors
///
/// Returns an error for a non-staff role, a weak password, an invalid email
/// or a username/email that is already taken.
pub async fn create_user(
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<User, AdminError> {
    let role = staff_role(role)?;
    let database_url = super::database_url().map_err(|e| AdminError::Config(e.to_string()))?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    let account = NewAccount {
        username: username.to_owned(),
        email: email.to_owned(),
        password: password.to_owned(),
        role,
        first_name: None,
        last_name: None,
        phone: None,
    };
    let user = AuthService::new(&pool).create_user(&account).await?;

    tracing::info!(
        "Staff user created successfully! ID: {}, Username: {}, Role: {}",
        user.id,
        user.username,
        user.role
    );
    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_role() {
        assert_eq!(staff_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(staff_role(" manager ").unwrap(), UserRole::Manager);
        assert!(matches!(
            staff_role("customer"),
            Err(AdminError::InvalidRole(_))
        ));
        assert!(staff_role("super_admin").is_err());
    }
}
