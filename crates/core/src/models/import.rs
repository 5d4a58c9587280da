//! Metasync import bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ImportHistoryId, ImportScheduleId, ImportStatus, ImportType};

/// Credentials for the Metasync API. The key is masked before leaving the
/// back-office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub api_key: String,
    pub company_id: i32,
    pub channel: String,
    pub active: bool,
}

impl ApiConfig {
    /// Key shipped in fresh databases; imports refuse to run with it.
    pub const PLACEHOLDER_KEY: &'static str = "API_KEY_PLACEHOLDER";

    /// Whether the config can actually reach the API.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.active
            && !self.api_key.trim().is_empty()
            && self.api_key != Self::PLACEHOLDER_KEY
            && self.company_id > 0
    }
}

/// A recurring import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ImportSchedule {
    pub id: ImportScheduleId,
    pub import_type: ImportType,
    /// Interval such as `12h`, `30m`, `1d`, `2w`.
    pub frequency: String,
    /// Anchor time of day as `HH:MM`.
    pub start_time: Option<String>,
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One import run and its counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ImportHistory {
    pub id: ImportHistoryId,
    pub import_type: ImportType,
    pub status: ImportStatus,
    pub is_full_import: bool,
    pub total_items: i32,
    pub processed_items: i32,
    pub new_items: i32,
    pub updated_items: i32,
    pub error_count: i32,
    pub errors: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_rejects_placeholder() {
        let mut config = ApiConfig {
            api_key: ApiConfig::PLACEHOLDER_KEY.into(),
            company_id: 1,
            channel: "MURCIA".into(),
            active: true,
        };
        assert!(!config.is_usable());
        config.api_key = "k3y-f0r-r34l".into();
        assert!(config.is_usable());
        config.company_id = 0;
        assert!(!config.is_usable());
    }
}
