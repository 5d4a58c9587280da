//! Messages sent through the public contact and valuation forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContactFormType, ContactMessageId, ContactStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub form_type: ContactFormType,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    /// Extra fields from the valuation form (make, model, year, km...).
    pub form_data: Option<serde_json::Value>,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}
