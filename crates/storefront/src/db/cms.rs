//! Read access to CMS content.

use std::collections::BTreeMap;

use sqlx::PgPool;

use desguace_core::{FooterBlock, HomepageBlock, Page};

use super::RepositoryError;

pub(crate) const PAGE_COLUMNS: &str = "id, slug, title, content, meta_title, meta_description, \
     is_published, is_editable, created_at, updated_at";

pub(crate) const HOMEPAGE_BLOCK_COLUMNS: &str = "id, block_type, title, subtitle, description, \
     icon, image, button_text, button_url, sort_order, is_active, created_at, updated_at";

pub(crate) const FOOTER_BLOCK_COLUMNS: &str =
    "id, title, block_type, content, sort_order, is_active, created_at, updated_at";

/// Repository for CMS reads.
pub struct CmsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CmsRepository<'a> {
    /// Create a new CMS repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A published page by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn published_page(&self, slug: &str) -> Result<Option<Page>, RepositoryError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE slug = $1 AND is_published = TRUE"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(page)
    }

    /// Active homepage blocks in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_homepage_blocks(&self) -> Result<Vec<HomepageBlock>, RepositoryError> {
        let blocks = sqlx::query_as::<_, HomepageBlock>(&format!(
            "SELECT {HOMEPAGE_BLOCK_COLUMNS} FROM homepage_blocks \
             WHERE is_active = TRUE ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(blocks)
    }

    /// Active footer blocks in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_footer_blocks(&self) -> Result<Vec<FooterBlock>, RepositoryError> {
        let blocks = sqlx::query_as::<_, FooterBlock>(&format!(
            "SELECT {FOOTER_BLOCK_COLUMNS} FROM footer_blocks \
             WHERE is_active = TRUE ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(blocks)
    }

    /// Public settings as a key/value map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn public_settings(&self) -> Result<BTreeMap<String, String>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM site_settings WHERE is_public = TRUE ORDER BY key",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// A single setting value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn setting(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM site_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;
        Ok(value)
    }
}
