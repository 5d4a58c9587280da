//! Pop-up management and interaction counts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use desguace_core::{
    ButtonAction, DisplayFrequency, Popup, PopupAction, PopupId, PopupTrigger, PopupType,
};

use super::{RepositoryError, default_true, require_affected};

const POPUP_COLUMNS: &str = "id, title, content, popup_type, trigger_type, \
     trigger_value, display_frequency, target_pages, exclude_pages, start_date, end_date, \
     is_active, show_close_button, button_text, button_url, button_action, priority, \
     created_at, updated_at";

/// Pop-up fields written by create and update. Validated by the route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub popup_type: PopupType,
    pub trigger_type: PopupTrigger,
    #[serde(default)]
    pub trigger_value: i32,
    pub display_frequency: DisplayFrequency,
    #[serde(default)]
    pub target_pages: Vec<String>,
    #[serde(default)]
    pub exclude_pages: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub show_close_button: bool,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    pub button_action: ButtonAction,
    #[serde(default)]
    pub priority: i32,
}

/// Raw interaction counts for one pop-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopupStatCounts {
    pub views: i64,
    pub clicks: i64,
    pub closes: i64,
    pub ignored: i64,
}

impl PopupStatCounts {
    fn add(&mut self, action: PopupAction, count: i64) {
        match action {
            PopupAction::Viewed => self.views += count,
            PopupAction::Clicked => self.clicks += count,
            PopupAction::Closed => self.closes += count,
            PopupAction::Ignored => self.ignored += count,
        }
    }
}

/// Repository for pop-up management.
pub struct PopupRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PopupRepository<'a> {
    /// Create a new pop-up repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every pop-up, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Popup>, RepositoryError> {
        let popups = sqlx::query_as::<_, Popup>(&format!(
            "SELECT {POPUP_COLUMNS} FROM popups ORDER BY priority DESC, created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(popups)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PopupId) -> Result<Option<Popup>, RepositoryError> {
        let popup = sqlx::query_as::<_, Popup>(&format!(
            "SELECT {POPUP_COLUMNS} FROM popups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(popup)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &PopupInput) -> Result<Popup, RepositoryError> {
        let popup = sqlx::query_as::<_, Popup>(&format!(
            "INSERT INTO popups (title, content, popup_type, trigger_type, trigger_value, \
             display_frequency, target_pages, exclude_pages, start_date, end_date, is_active, \
             show_close_button, button_text, button_url, button_action, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {POPUP_COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.popup_type)
        .bind(input.trigger_type)
        .bind(input.trigger_value)
        .bind(input.display_frequency)
        .bind(&input.target_pages)
        .bind(&input.exclude_pages)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.is_active)
        .bind(input.show_close_button)
        .bind(&input.button_text)
        .bind(&input.button_url)
        .bind(input.button_action)
        .bind(input.priority)
        .fetch_one(self.pool)
        .await?;
        Ok(popup)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown pop-up.
    pub async fn update(&self, id: PopupId, input: &PopupInput) -> Result<Popup, RepositoryError> {
        sqlx::query_as::<_, Popup>(&format!(
            "UPDATE popups SET title = $2, content = $3, popup_type = $4, trigger_type = $5, \
             trigger_value = $6, display_frequency = $7, target_pages = $8, exclude_pages = $9, \
             start_date = $10, end_date = $11, is_active = $12, show_close_button = $13, \
             button_text = $14, button_url = $15, button_action = $16, priority = $17, \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {POPUP_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.popup_type)
        .bind(input.trigger_type)
        .bind(input.trigger_value)
        .bind(input.display_frequency)
        .bind(&input.target_pages)
        .bind(&input.exclude_pages)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.is_active)
        .bind(input.show_close_button)
        .bind(&input.button_text)
        .bind(&input.button_url)
        .bind(input.button_action)
        .bind(input.priority)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a pop-up and, through the cascade, its stats.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown pop-up.
    pub async fn delete(&self, id: PopupId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM popups WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// Flip `is_active`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown pop-up.
    pub async fn toggle(&self, id: PopupId) -> Result<Popup, RepositoryError> {
        sqlx::query_as::<_, Popup>(&format!(
            "UPDATE popups SET is_active = NOT is_active, updated_at = NOW() \
             WHERE id = $1 RETURNING {POPUP_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Interaction counts per pop-up. Pop-ups without stats are absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stat_counts(
        &self,
        only: Option<PopupId>,
    ) -> Result<HashMap<PopupId, PopupStatCounts>, RepositoryError> {
        let rows = sqlx::query_as::<_, (PopupId, PopupAction, i64)>(
            r"
            SELECT popup_id, action, COUNT(*)
            FROM popup_stats
            WHERE $1::INTEGER IS NULL OR popup_id = $1
            GROUP BY popup_id, action
            ",
        )
        .bind(only)
        .fetch_all(self.pool)
        .await?;

        let mut counts: HashMap<PopupId, PopupStatCounts> = HashMap::new();
        for (popup_id, action, count) in rows {
            counts.entry(popup_id).or_default().add(action, count);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate_by_action() {
        let mut counts = PopupStatCounts::default();
        counts.add(PopupAction::Viewed, 10);
        counts.add(PopupAction::Clicked, 3);
        counts.add(PopupAction::Viewed, 2);
        counts.add(PopupAction::Ignored, 1);
        assert_eq!(
            counts,
            PopupStatCounts { views: 12, clicks: 3, closes: 0, ignored: 1 }
        );
    }
}
