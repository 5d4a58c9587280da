//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions, and the
//! [`Shopper`] extractor that ties a session to its cart.

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;
use crate::db::CartOwner;
use crate::middleware::auth::AuthRejection;
use crate::models::{CurrentUser, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "dsg_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// # Arguments
///
/// * `pool` - `PostgreSQL` connection pool
/// * `config` - Storefront configuration (for the cookie `Secure` flag)
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    // The tower_sessions.session table is created by the migrations
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The visitor behind a request: their session, the logged-in user if any,
/// and the guest token that owns their cart and guest orders.
///
/// The token is created on first use and survives login, so orders placed as
/// a guest stay visible afterwards.
pub struct Shopper {
    pub session: Session,
    pub user: Option<CurrentUser>,
    pub token: String,
}

impl Shopper {
    /// Cart owner: the user when logged in, otherwise the guest token.
    #[must_use]
    pub fn owner(&self) -> CartOwner {
        self.user.as_ref().map_or_else(
            || CartOwner::Guest(self.token.clone()),
            |user| CartOwner::User(user.id),
        )
    }

    /// The logged-in user's id.
    #[must_use]
    pub fn user_id(&self) -> Option<desguace_core::UserId> {
        self.user.as_ref().map(|u| u.id)
    }
}

impl<S> FromRequestParts<S> for Shopper
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::SessionUnavailable)?;

        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();

        let token = ensure_cart_token(&session)
            .await
            .map_err(|_| AuthRejection::SessionUnavailable)?;

        Ok(Self {
            session,
            user,
            token,
        })
    }
}

/// Read the session's guest token, creating one if needed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn ensure_cart_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CART_TOKEN).await? {
        return Ok(token);
    }
    let token = uuid::Uuid::new_v4().to_string();
    session.insert(session_keys::CART_TOKEN, &token).await?;
    Ok(token)
}
