//! Contact inbox.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use desguace_core::{ContactFormType, ContactMessage, ContactMessageId, ContactStatus};

use crate::db::ContactRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    pub form_type: Option<ContactFormType>,
    pub status: Option<ContactStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ContactStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<ContactMessage>>> {
    Ok(Json(
        ContactRepository::new(state.pool())
            .list(query.form_type, query.status)
            .await?,
    ))
}

pub async fn set_status(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ContactMessageId>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ContactMessage>> {
    Ok(Json(
        ContactRepository::new(state.pool())
            .set_status(id, request.status)
            .await?,
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ContactMessageId>,
) -> Result<StatusCode> {
    ContactRepository::new(state.pool()).delete(id).await?;
    info!(message_id = %id, by = %staff.id, "Contact message deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_count(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<UnreadCount>> {
    let count = ContactRepository::new(state.pool()).unread_count().await?;
    Ok(Json(UnreadCount { count }))
}

/// Email an answer to the sender and mark the message replied.
///
/// Unlike status notifications, the send is awaited: staff need to know
/// whether the answer went out.
#[instrument(skip(state, staff, request))]
pub async fn reply(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ContactMessageId>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ContactMessage>> {
    let body = request.message.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("La respuesta no puede estar vacía".to_string()));
    }
    let email = state
        .email()
        .ok_or_else(|| AppError::BadRequest("El envío de emails no está configurado".to_string()))?;

    let repo = ContactRepository::new(state.pool());
    let message = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Mensaje no encontrado".to_string()))?;
    email.send_contact_reply(&message, body).await?;

    let message = repo.set_status(id, ContactStatus::Replied).await?;
    info!(message_id = %id, by = %staff.id, "Contact message answered");
    Ok(Json(message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_query_filters() {
        let query: InboxQuery =
            serde_json::from_str(r#"{"formType":"valuation","status":"unread"}"#).unwrap();
        assert_eq!(query.form_type, Some(ContactFormType::Valuation));
        assert_eq!(query.status, Some(ContactStatus::Unread));

        let query: InboxQuery = serde_json::from_str("{}").unwrap();
        assert!(query.form_type.is_none());
    }
}
