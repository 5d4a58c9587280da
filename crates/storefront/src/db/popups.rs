//! Pop-up reads and interaction logging.

use sqlx::PgPool;

use desguace_core::{Popup, PopupAction, PopupId, UserId};

use super::RepositoryError;

pub(crate) const POPUP_COLUMNS: &str = "id, title, content, popup_type, trigger_type, \
     trigger_value, display_frequency, target_pages, exclude_pages, start_date, end_date, \
     is_active, show_close_button, button_text, button_url, button_action, priority, \
     created_at, updated_at";

/// An interaction to log against a pop-up.
#[derive(Debug, Clone)]
pub struct NewPopupStat {
    pub popup_id: PopupId,
    pub user_id: Option<UserId>,
    pub session_id: Option<String>,
    pub action: PopupAction,
    pub page_url: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Repository for pop-ups on the public site.
pub struct PopupRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PopupRepository<'a> {
    /// Create a new pop-up repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active pop-ups within their date window, highest priority first.
    ///
    /// Page targeting is applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn live(&self) -> Result<Vec<Popup>, RepositoryError> {
        let popups = sqlx::query_as::<_, Popup>(&format!(
            "SELECT {POPUP_COLUMNS} FROM popups \
             WHERE is_active = TRUE \
               AND (start_date IS NULL OR start_date <= NOW()) \
               AND (end_date IS NULL OR end_date >= NOW()) \
             ORDER BY priority DESC, created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(popups)
    }

    /// Whether a pop-up exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: PopupId) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM popups WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Log an interaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_stat(&self, stat: &NewPopupStat) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO popup_stats (popup_id, user_id, session_id, action, page_url,
                user_agent, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(stat.popup_id)
        .bind(stat.user_id)
        .bind(&stat.session_id)
        .bind(stat.action)
        .bind(&stat.page_url)
        .bind(&stat.user_agent)
        .bind(&stat.ip_address)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
