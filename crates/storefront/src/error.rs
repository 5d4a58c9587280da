//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`
//! and errors reach the client as `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use desguace_core::cart::CartError;
use desguace_core::shipping::ShippingError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::payments::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment module failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Cart rule violated.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Shipping could not be quoted.
    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Form validation failed; every problem is reported.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::PasswordMismatch
                | AuthError::MissingField(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Payment(err) => match err {
                PaymentError::NotConfigured(_) | PaymentError::Unsupported(_) => {
                    StatusCode::BAD_REQUEST
                }
                PaymentError::InvalidSignature | PaymentError::InvalidCallback(_) => {
                    StatusCode::BAD_REQUEST
                }
                PaymentError::Gateway { .. } | PaymentError::Http(_) => StatusCode::BAD_GATEWAY,
                PaymentError::InvalidConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
                PaymentError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                PaymentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(CartError::NotInCart(_)) => StatusCode::NOT_FOUND,
            Self::Cart(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Shipping(ShippingError::ProvinceNotFound) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Shipping(_) | Self::BadRequest(_) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Recurso no encontrado".to_string(),
            Self::Database(RepositoryError::Conflict(_)) => "El recurso ya existe".to_string(),
            Self::Database(_) | Self::Internal(_) => "Error interno del servidor".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Credenciales incorrectas".to_string(),
                AuthError::UserNotFound => "Usuario no encontrado".to_string(),
                AuthError::UserAlreadyExists => {
                    "Ya existe una cuenta con ese usuario o email".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Email no válido".to_string(),
                AuthError::PasswordMismatch => "Las contraseñas no coinciden".to_string(),
                AuthError::MissingField(field) => format!("El campo {field} es obligatorio"),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Error de autenticación".to_string()
                }
            },
            Self::Payment(err) => match err {
                PaymentError::NotConfigured(_) | PaymentError::Unsupported(_) => {
                    "Método de pago no disponible".to_string()
                }
                PaymentError::InvalidSignature => "Firma de pago no válida".to_string(),
                PaymentError::InvalidCallback(_) => "Notificación de pago no válida".to_string(),
                PaymentError::Gateway { .. } | PaymentError::Http(_) => {
                    "Error en la pasarela de pago".to_string()
                }
                PaymentError::InvalidConfig(_) => {
                    "Método de pago temporalmente no disponible".to_string()
                }
                PaymentError::Repository(RepositoryError::NotFound) => {
                    "Pedido no encontrado".to_string()
                }
                PaymentError::Repository(_) => "Error interno del servidor".to_string(),
            },
            Self::Cart(err) => err.to_string(),
            Self::Shipping(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Validation(_) => "Datos no válidos".to_string(),
            Self::RateLimited => "Demasiadas peticiones".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
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

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error, e.g. cart changes before a failed checkout.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use desguace_core::PartId;
    use desguace_core::payment::PaymentProvider;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("pieza 123".to_string());
        assert_eq!(err.to_string(), "Not found: pieza 123");

        let err = AppError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Validation failed: a, b");
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
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(CartError::AlreadyInCart(PartId::new(1)).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CartError::NotInCart(PartId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ShippingError::ProvinceNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ShippingError::NoMethodsAvailable.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PaymentError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PaymentError::NotConfigured(PaymentProvider::Stripe).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection refused at 10.0.0.3".to_string());
        assert_eq!(err.client_message(), "Error interno del servidor");
        let err = AppError::Cart(CartError::AlreadyInCart(PartId::new(1)));
        assert_eq!(err.client_message(), "Producto ya en el carrito");
    }
}
