//! Content-management records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{FooterBlockId, HomepageBlockId, PageId, SiteSettingId};

/// A static page addressed by slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_published: bool,
    /// System pages (legal notices, cookies) cannot be deleted.
    pub is_editable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct HomepageBlock {
    pub id: HomepageBlockId,
    pub block_type: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct FooterBlock {
    pub id: FooterBlockId,
    pub title: String,
    pub block_type: String,
    pub content: serde_json::Value,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SiteSetting {
    pub id: SiteSettingId,
    pub key: String,
    pub value: String,
    pub category: String,
    /// Exposed to the storefront without authentication.
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

/// Setting key holding `"true"` while the shop is closed for maintenance.
pub const MAINTENANCE_MODE_KEY: &str = "maintenance_mode";
/// Setting key for the text shown during maintenance.
pub const MAINTENANCE_MESSAGE_KEY: &str = "maintenance_message";

/// Maintenance switch exposed to the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub maintenance_mode: bool,
    pub maintenance_message: String,
}

impl SiteConfig {
    /// Build from raw setting values. Anything but `"true"` means open.
    #[must_use]
    pub fn from_settings(mode: Option<&str>, message: Option<&str>) -> Self {
        Self {
            maintenance_mode: mode.is_some_and(|m| m.trim().eq_ignore_ascii_case("true")),
            maintenance_message: message.unwrap_or_default().to_owned(),
        }
    }

    /// The stored value of the mode setting.
    #[must_use]
    pub const fn mode_value(&self) -> &'static str {
        if self.maintenance_mode { "true" } else { "false" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_config_from_settings() {
        let config = SiteConfig::from_settings(Some("TRUE"), Some("Volvemos pronto"));
        assert!(config.maintenance_mode);
        assert_eq!(config.maintenance_message, "Volvemos pronto");
        assert_eq!(config.mode_value(), "true");

        let open = SiteConfig::from_settings(Some("1"), None);
        assert!(!open.maintenance_mode);
        assert_eq!(open.maintenance_message, "");
    }
}
