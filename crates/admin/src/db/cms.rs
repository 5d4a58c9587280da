//! CMS writes: pages, homepage and footer blocks, site settings.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

use desguace_core::models::cms::{MAINTENANCE_MESSAGE_KEY, MAINTENANCE_MODE_KEY};
use desguace_core::{
    FooterBlock, FooterBlockId, HomepageBlock, HomepageBlockId, Page, PageId, SiteConfig,
    SiteSetting,
};

use super::{RepositoryError, conflict_on_unique, default_true, require_affected};

const PAGE_COLUMNS: &str = "id, slug, title, content, meta_title, meta_description, \
     is_published, is_editable, created_at, updated_at";

const HOMEPAGE_BLOCK_COLUMNS: &str = "id, block_type, title, subtitle, description, icon, image, \
     button_text, button_url, sort_order, is_active, created_at, updated_at";

const FOOTER_BLOCK_COLUMNS: &str =
    "id, title, block_type, content, sort_order, is_active, created_at, updated_at";

const SETTING_COLUMNS: &str = "id, key, value, category, is_public, updated_at";

/// Category given to settings created through a bulk upsert.
const DEFAULT_SETTING_CATEGORY: &str = "general";

/// Page fields written by create and update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomepageBlockInput {
    pub block_type: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FooterBlockInput {
    pub title: String,
    pub block_type: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Repository for CMS writes.
pub struct CmsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CmsRepository<'a> {
    /// Create a new CMS repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // ===== Pages =====

    /// Every page, published or not, by title.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pages(&self) -> Result<Vec<Page>, RepositoryError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages ORDER BY title"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(pages)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn page(&self, id: PageId) -> Result<Option<Page>, RepositoryError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(page)
    }

    /// Create an editable page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_page(&self, input: &PageInput) -> Result<Page, RepositoryError> {
        sqlx::query_as::<_, Page>(&format!(
            "INSERT INTO pages (slug, title, content, meta_title, meta_description, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PAGE_COLUMNS}"
        ))
        .bind(&input.slug)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.meta_title)
        .bind(&input.meta_description)
        .bind(input.is_published)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "page slug"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown page and
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update_page(&self, id: PageId, input: &PageInput) -> Result<Page, RepositoryError> {
        sqlx::query_as::<_, Page>(&format!(
            "UPDATE pages SET slug = $2, title = $3, content = $4, meta_title = $5, \
             meta_description = $6, is_published = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {PAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.slug)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.meta_title)
        .bind(&input.meta_description)
        .bind(input.is_published)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "page slug"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a page. System pages (`is_editable = false`) are refused with
    /// `Conflict`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown page.
    pub async fn delete_page(&self, id: PageId) -> Result<(), RepositoryError> {
        let editable = sqlx::query_scalar::<_, bool>("SELECT is_editable FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if !editable {
            return Err(RepositoryError::Conflict("system page".to_owned()));
        }

        let result = sqlx::query("DELETE FROM pages WHERE id = $1 AND is_editable = TRUE")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    // ===== Homepage blocks =====

    /// Every block in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn homepage_blocks(&self) -> Result<Vec<HomepageBlock>, RepositoryError> {
        let blocks = sqlx::query_as::<_, HomepageBlock>(&format!(
            "SELECT {HOMEPAGE_BLOCK_COLUMNS} FROM homepage_blocks ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(blocks)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_homepage_block(
        &self,
        input: &HomepageBlockInput,
    ) -> Result<HomepageBlock, RepositoryError> {
        let block = sqlx::query_as::<_, HomepageBlock>(&format!(
            "INSERT INTO homepage_blocks (block_type, title, subtitle, description, icon, image, \
             button_text, button_url, sort_order, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {HOMEPAGE_BLOCK_COLUMNS}"
        ))
        .bind(&input.block_type)
        .bind(&input.title)
        .bind(&input.subtitle)
        .bind(&input.description)
        .bind(&input.icon)
        .bind(&input.image)
        .bind(&input.button_text)
        .bind(&input.button_url)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(block)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown block.
    pub async fn update_homepage_block(
        &self,
        id: HomepageBlockId,
        input: &HomepageBlockInput,
    ) -> Result<HomepageBlock, RepositoryError> {
        sqlx::query_as::<_, HomepageBlock>(&format!(
            "UPDATE homepage_blocks SET block_type = $2, title = $3, subtitle = $4, \
             description = $5, icon = $6, image = $7, button_text = $8, button_url = $9, \
             sort_order = $10, is_active = $11, updated_at = NOW() \
             WHERE id = $1 RETURNING {HOMEPAGE_BLOCK_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.block_type)
        .bind(&input.title)
        .bind(&input.subtitle)
        .bind(&input.description)
        .bind(&input.icon)
        .bind(&input.image)
        .bind(&input.button_text)
        .bind(&input.button_url)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown block.
    pub async fn delete_homepage_block(&self, id: HomepageBlockId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM homepage_blocks WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// Apply new sort orders in one transaction. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any update fails; nothing is
    /// written in that case.
    pub async fn reorder_homepage_blocks(
        &self,
        order: &[(HomepageBlockId, i32)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (id, sort_order) in order {
            sqlx::query(
                "UPDATE homepage_blocks SET sort_order = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(sort_order)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ===== Footer blocks =====

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn footer_blocks(&self) -> Result<Vec<FooterBlock>, RepositoryError> {
        let blocks = sqlx::query_as::<_, FooterBlock>(&format!(
            "SELECT {FOOTER_BLOCK_COLUMNS} FROM footer_blocks ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(blocks)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_footer_block(
        &self,
        input: &FooterBlockInput,
    ) -> Result<FooterBlock, RepositoryError> {
        let block = sqlx::query_as::<_, FooterBlock>(&format!(
            "INSERT INTO footer_blocks (title, block_type, content, sort_order, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {FOOTER_BLOCK_COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.block_type)
        .bind(&input.content)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(block)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown block.
    pub async fn update_footer_block(
        &self,
        id: FooterBlockId,
        input: &FooterBlockInput,
    ) -> Result<FooterBlock, RepositoryError> {
        sqlx::query_as::<_, FooterBlock>(&format!(
            "UPDATE footer_blocks SET title = $2, block_type = $3, content = $4, \
             sort_order = $5, is_active = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING {FOOTER_BLOCK_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.block_type)
        .bind(&input.content)
        .bind(input.sort_order)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown block.
    pub async fn delete_footer_block(&self, id: FooterBlockId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM footer_blocks WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    // ===== Settings =====

    /// Every setting, grouped by category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn settings_by_category(
        &self,
    ) -> Result<BTreeMap<String, Vec<SiteSetting>>, RepositoryError> {
        let settings = sqlx::query_as::<_, SiteSetting>(&format!(
            "SELECT {SETTING_COLUMNS} FROM site_settings ORDER BY category, key"
        ))
        .fetch_all(self.pool)
        .await?;

        let mut grouped: BTreeMap<String, Vec<SiteSetting>> = BTreeMap::new();
        for setting in settings {
            grouped.entry(setting.category.clone()).or_default().push(setting);
        }
        Ok(grouped)
    }

    /// Upsert settings in one transaction. New keys land in the `general`
    /// category; existing keys keep theirs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn upsert_settings(
        &self,
        values: &BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                r"
                INSERT INTO site_settings (key, value, category)
                VALUES ($1, $2, $3)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                ",
            )
            .bind(key)
            .bind(value)
            .bind(DEFAULT_SETTING_CATEGORY)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Store the maintenance switch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either write fails.
    pub async fn set_site_config(&self, config: &SiteConfig) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in [
            (MAINTENANCE_MODE_KEY, config.mode_value()),
            (MAINTENANCE_MESSAGE_KEY, config.maintenance_message.as_str()),
        ] {
            sqlx::query(
                r"
                INSERT INTO site_settings (key, value, category, is_public)
                VALUES ($1, $2, 'site', TRUE)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                ",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
