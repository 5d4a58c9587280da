//! Payment method configuration and the per-provider form schemas.
//!
//! Secrets never leave the server: stored password fields are masked on
//! the way out and a masked value sent back keeps the stored secret.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use desguace_core::payment::{
    ConfigField, PaymentProvider, config_fields, mask_secrets, merge_secrets, validate_config,
};
use desguace_core::{PaymentConfig, PaymentConfigId};

use crate::db::{PaymentConfigInput, PaymentConfigRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRequest {
    pub provider: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSchema {
    pub provider: PaymentProvider,
    pub name: &'static str,
    pub is_online: bool,
    pub fields: Vec<ConfigField>,
}

impl From<PaymentProvider> for ProviderSchema {
    fn from(provider: PaymentProvider) -> Self {
        Self {
            provider,
            name: provider.display_name(),
            is_online: provider.is_online(),
            fields: config_fields(provider),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn parse_provider(raw: &str) -> Result<PaymentProvider> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Proveedor de pago desconocido: {raw}")))
}

fn masked(mut config: PaymentConfig) -> PaymentConfig {
    config.config = mask_secrets(config.provider, &config.config);
    config
}

impl PaymentMethodRequest {
    /// Build the stored form, with `config` already merged and validated.
    fn into_input(self, provider: PaymentProvider, config: Value) -> Result<PaymentConfigInput> {
        validate_config(provider, &config).map_err(AppError::Validation)?;
        let name = self
            .name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| provider.display_name().to_owned());
        Ok(PaymentConfigInput {
            provider,
            name,
            is_active: self.is_active,
            config,
            sort_order: self.sort_order,
        })
    }
}

// ===== Payment methods =====

pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<Vec<PaymentConfig>>> {
    let configs = PaymentConfigRepository::new(state.pool()).list().await?;
    Ok(Json(configs.into_iter().map(masked).collect()))
}

#[instrument(skip(state, staff, request), fields(provider = %request.provider))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(mut request): Json<PaymentMethodRequest>,
) -> Result<(StatusCode, Json<PaymentConfig>)> {
    let provider = parse_provider(&request.provider)?;
    let config = std::mem::take(&mut request.config);
    let input = request.into_input(provider, config)?;
    let created = PaymentConfigRepository::new(state.pool())
        .create(&input)
        .await?;
    info!(config_id = %created.id, %provider, by = %staff.id, "Payment method created");
    Ok((StatusCode::CREATED, Json(masked(created))))
}

#[instrument(skip(state, staff, request))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<PaymentConfigId>,
    Json(mut request): Json<PaymentMethodRequest>,
) -> Result<Json<PaymentConfig>> {
    let repo = PaymentConfigRepository::new(state.pool());
    let stored = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Método de pago no encontrado".to_string()))?;
    let provider = parse_provider(&request.provider)?;

    let incoming = std::mem::take(&mut request.config);
    let config = if provider == stored.provider {
        merge_secrets(provider, incoming, &stored.config)
    } else {
        incoming
    };
    let input = request.into_input(provider, config)?;
    let updated = repo.update(id, &input).await?;
    info!(config_id = %id, %provider, by = %staff.id, "Payment method updated");
    Ok(Json(masked(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<PaymentConfigId>,
) -> Result<StatusCode> {
    PaymentConfigRepository::new(state.pool()).delete(id).await?;
    info!(config_id = %id, by = %staff.id, "Payment method deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Flip a method on or off. Switching on requires a complete configuration.
pub async fn toggle(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<PaymentConfigId>,
) -> Result<Json<PaymentConfig>> {
    let repo = PaymentConfigRepository::new(state.pool());
    let current = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Método de pago no encontrado".to_string()))?;
    let activate = !current.is_active;
    if activate {
        validate_config(current.provider, &current.config).map_err(AppError::Validation)?;
    }
    let updated = repo.set_active(id, activate).await?;
    info!(config_id = %id, active = activate, by = %staff.id, "Payment method toggled");
    Ok(Json(masked(updated)))
}

// ===== Module schemas =====

pub async fn modules(RequireStaff(_): RequireStaff) -> Json<Vec<ProviderSchema>> {
    Json(PaymentProvider::ALL.iter().copied().map(ProviderSchema::from).collect())
}

pub async fn module(
    RequireStaff(_): RequireStaff,
    Path(provider): Path<String>,
) -> Result<Json<ProviderSchema>> {
    Ok(Json(parse_provider(&provider)?.into()))
}

pub async fn validate(
    RequireStaff(_): RequireStaff,
    Path(provider): Path<String>,
    Json(config): Json<Value>,
) -> Result<Json<ValidationReport>> {
    let provider = parse_provider(&provider)?;
    Ok(Json(report(provider, &config)))
}

fn report(provider: PaymentProvider, config: &Value) -> ValidationReport {
    match validate_config(provider, config) {
        Ok(()) => ValidationReport {
            valid: true,
            errors: Vec::new(),
        },
        Err(errors) => ValidationReport {
            valid: false,
            errors,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(parse_provider("bizum").is_err());
        assert_eq!(parse_provider(" stripe ").unwrap(), PaymentProvider::Stripe);
    }

    #[test]
    fn test_validation_report() {
        let report_ok = report(
            PaymentProvider::Stripe,
            &json!({"publicKey": "pk_test", "secretKey": "sk_test"}),
        );
        assert!(report_ok.valid);
        assert!(report_ok.errors.is_empty());

        let report_bad = report(PaymentProvider::Stripe, &json!({}));
        assert!(!report_bad.valid);
        assert!(!report_bad.errors.is_empty());
    }

    #[test]
    fn test_request_defaults_name_to_provider() {
        let request: PaymentMethodRequest = serde_json::from_str(
            r#"{"provider":"bank_transfer","config":{"bank_name":"Banco","account_number":"ES00"}}"#,
        )
        .unwrap();
        let config = request.config.clone();
        let input = request
            .into_input(PaymentProvider::BankTransfer, config)
            .unwrap();
        assert_eq!(input.name, "Transferencia bancaria");
        assert!(!input.is_active);
    }

    #[test]
    fn test_incomplete_config_fails_input() {
        let request: PaymentMethodRequest =
            serde_json::from_str(r#"{"provider":"cash","config":{}}"#).unwrap();
        let err = request.into_input(PaymentProvider::Cash, json!({})).unwrap_err();
        assert!(matches!(err, AppError::Validation(errors) if errors.len() == 3));
    }
}
