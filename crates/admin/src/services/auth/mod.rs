//! Staff authentication and password handling.
//!
//! Staff log in with the same argon2 hashes the storefront writes; only the
//! role check differs.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use desguace_core::{Email, User, UserId, UserRole};

use crate::db::{NewUser, UserRepository};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// An account to create, with its password in clear.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Staff authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Log in a manager or admin by username or email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the identifier or password
    /// is wrong and `AuthError::NotStaff` for customer accounts.
    pub async fn login_staff(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let (user, password_hash) = self
            .users
            .find_for_login(identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.role.is_staff() {
            tracing::warn!(user_id = %user.id, "Customer attempted back-office login");
            return Err(AuthError::NotStaff);
        }
        Ok(user)
    }

    /// Create an account of any role from a plain password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` for a blank username,
    /// `AuthError::WeakPassword` for a short password and
    /// `AuthError::UserAlreadyExists` if the username or email is taken.
    pub async fn create_user(&self, account: &NewAccount) -> Result<User, AuthError> {
        let username = account.username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingField("username"));
        }
        let email = Email::parse(&account.email)?;
        validate_password(&account.password)?;

        let new = NewUser {
            username: username.to_owned(),
            email,
            password_hash: hash_password(&account.password)?,
            role: account.role,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            phone: account.phone.clone(),
        };
        Ok(self.users.create(&new).await?)
    }

    /// Replace a user's password without knowing the old one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for a short password and
    /// `AuthError::UserNotFound` for an unknown user.
    pub async fn set_password(
        &self,
        user_id: UserId,
        password: &str,
    ) -> Result<(), AuthError> {
        validate_password(password)?;
        self.users
            .update_password(user_id, &hash_password(password)?)
            .await?;
        Ok(())
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "La contraseña debe tener al menos {MIN_PASSWORD_LENGTH} caracteres"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_length() {
        assert!(validate_password("corto").is_err());
        assert!(validate_password("bastante-larga").is_ok());
    }

    #[test]
    fn test_hash_roundtrip_rejects_wrong_password() {
        let hash = hash_password("desguace2025").unwrap();
        assert!(verify_password("desguace2025", &hash).is_ok());
        assert!(matches!(
            verify_password("desguace2024", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
