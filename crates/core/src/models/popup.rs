//! Marketing pop-ups and their interaction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ButtonAction, DisplayFrequency, PopupAction, PopupId, PopupStatId, PopupTrigger, PopupType,
    UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Popup {
    pub id: PopupId,
    pub title: String,
    pub content: String,
    pub popup_type: PopupType,
    pub trigger_type: PopupTrigger,
    /// Seconds for `delay`, percent for `scroll`.
    pub trigger_value: i32,
    pub display_frequency: DisplayFrequency,
    pub target_pages: Vec<String>,
    pub exclude_pages: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub show_close_button: bool,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub button_action: ButtonAction,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Popup {
    /// Whether the pop-up is switched on and inside its date window.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.start_date.is_none_or(|start| start <= now)
            && self.end_date.is_none_or(|end| end >= now)
    }

    /// Whether the pop-up should appear on `page`.
    ///
    /// An empty target list means every page. Entries match exactly or as a
    /// path prefix. Exclusions win over targets.
    #[must_use]
    pub fn targets_page(&self, page: &str) -> bool {
        let matches = |pattern: &String| page == pattern || page.starts_with(pattern.as_str());
        let targeted = self.target_pages.is_empty() || self.target_pages.iter().any(matches);
        targeted && !self.exclude_pages.iter().any(matches)
    }
}

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PopupStat {
    pub id: PopupStatId,
    pub popup_id: PopupId,
    pub user_id: Option<UserId>,
    pub session_id: Option<String>,
    pub action: PopupAction,
    pub page_url: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn popup(target: &[&str], exclude: &[&str]) -> Popup {
        Popup {
            id: PopupId::new(1),
            title: "Rebajas".into(),
            content: "10% en motores".into(),
            popup_type: PopupType::Promotion,
            trigger_type: PopupTrigger::Immediate,
            trigger_value: 0,
            display_frequency: DisplayFrequency::Once,
            target_pages: target.iter().map(ToString::to_string).collect(),
            exclude_pages: exclude.iter().map(ToString::to_string).collect(),
            start_date: None,
            end_date: None,
            is_active: true,
            show_close_button: true,
            button_text: None,
            button_url: None,
            button_action: ButtonAction::Close,
            priority: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_empty_targets_match_everything() {
        assert!(popup(&[], &[]).targets_page("/"));
        assert!(popup(&[], &[]).targets_page("/parts/12"));
    }

    #[test]
    fn test_prefix_targets_and_exclusions() {
        let p = popup(&["/parts"], &["/parts/checkout"]);
        assert!(p.targets_page("/parts"));
        assert!(p.targets_page("/parts/44"));
        assert!(!p.targets_page("/vehicles"));
        assert!(!p.targets_page("/parts/checkout"));
    }

    #[test]
    fn test_date_window() {
        let now = Utc::now();
        let mut p = popup(&[], &[]);
        p.start_date = Some(now - chrono::Duration::days(1));
        p.end_date = Some(now + chrono::Duration::days(1));
        assert!(p.is_live_at(now));
        p.end_date = Some(now - chrono::Duration::hours(1));
        assert!(!p.is_live_at(now));
        p.end_date = None;
        p.is_active = false;
        assert!(!p.is_live_at(now));
    }
}
