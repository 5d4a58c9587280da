//! Session-related types for back-office authentication.

use serde::{Deserialize, Serialize};

use desguace_core::{Email, User, UserId, UserRole};

/// Session-stored staff identity.
///
/// Minimal data stored in the session to identify the logged-in staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// User's email address.
    pub email: Email,
    /// Privilege level; only managers and admins get a session here.
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether this staff member may manage users and backups.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Session keys for back-office authentication data.
pub mod keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_USER: &str = "current_user";
}
