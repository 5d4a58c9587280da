//! Contact and vehicle-valuation forms.
//!
//! Both forms land in the admin inbox as `contact_messages` rows. The
//! valuation form keeps whatever vehicle fields the client sends as JSON.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use desguace_core::{ContactFormType, ContactMessageId, Email};

use crate::db::{ContactRepository, NewContactMessage};
use crate::error::{AppError, Result};
use crate::state::AppState;

const MIN_MESSAGE_LEN: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// "Sell us your vehicle" form. Every field besides the contact details is
/// vehicle data.
#[derive(Debug, Deserialize)]
pub struct ValuationForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    #[serde(flatten)]
    pub vehicle: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct Submitted {
    pub success: bool,
    pub id: ContactMessageId,
}

/// Collect every problem with the common fields.
fn validate(name: &str, email: &str, message: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push("El nombre es obligatorio".to_owned());
    }
    if Email::parse(email).is_err() {
        errors.push("Email no válido".to_owned());
    }
    if let Some(message) = message
        && message.trim().chars().count() < MIN_MESSAGE_LEN
    {
        errors.push(format!(
            "El mensaje debe tener al menos {MIN_MESSAGE_LEN} caracteres"
        ));
    }
    errors
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

async fn store(state: &AppState, new: NewContactMessage) -> Result<(StatusCode, Json<Submitted>)> {
    let stored = ContactRepository::new(state.pool()).create(&new).await?;
    info!(id = %stored.id, form_type = %new.form_type, "Contact message stored");
    Ok((
        StatusCode::CREATED,
        Json(Submitted {
            success: true,
            id: stored.id,
        }),
    ))
}

#[instrument(skip(state, form))]
pub async fn contact(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<Submitted>)> {
    let errors = validate(&form.name, &form.email, Some(&form.message));
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    store(
        &state,
        NewContactMessage {
            form_type: ContactFormType::Contact,
            name: form.name.trim().to_owned(),
            email: form.email.trim().to_lowercase(),
            phone: non_empty(form.phone),
            subject: non_empty(form.subject),
            message: Some(form.message.trim().to_owned()),
            form_data: None,
        },
    )
    .await
}

/// The free-text message is optional here, but must meet the minimum length
/// when given.
#[instrument(skip(state, form))]
pub async fn vehicle_valuation(
    State(state): State<AppState>,
    Json(form): Json<ValuationForm>,
) -> Result<(StatusCode, Json<Submitted>)> {
    let message = non_empty(form.message);
    let errors = validate(&form.name, &form.email, message.as_deref());
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    store(
        &state,
        NewContactMessage {
            form_type: ContactFormType::Valuation,
            name: form.name.trim().to_owned(),
            email: form.email.trim().to_lowercase(),
            phone: non_empty(form.phone),
            subject: Some("Tasación de vehículo".to_owned()),
            message,
            form_data: Some(Value::Object(form.vehicle)),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reports_every_problem() {
        let errors = validate(" ", "not-an-email", Some("corto"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_accepts_complete_form() {
        assert!(validate("Ana", "ana@example.com", Some("Busco un alternador")).is_empty());
        assert!(validate("Ana", "ana@example.com", None).is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_valuation_keeps_vehicle_fields() {
        let form: ValuationForm = serde_json::from_str(
            r#"{"name":"Ana","email":"ana@example.com","phone":"600000000",
                "marca":"SEAT","modelo":"Ibiza","anyo":2008}"#,
        )
        .unwrap();
        assert_eq!(form.vehicle.len(), 3);
        assert_eq!(form.vehicle["marca"], "SEAT");
        assert!(!form.vehicle.contains_key("email"));
    }
}
