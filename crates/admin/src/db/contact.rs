//! Contact inbox.

use sqlx::{PgPool, Postgres, QueryBuilder};

use desguace_core::{ContactFormType, ContactMessage, ContactMessageId, ContactStatus};

use super::{RepositoryError, require_affected};

const MESSAGE_COLUMNS: &str =
    "id, form_type, name, email, phone, subject, message, form_data, status, created_at";

/// Repository for reading and triaging contact messages.
pub struct ContactRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactRepository<'a> {
    /// Create a new contact repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Messages newest first, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        form_type: Option<ContactFormType>,
        status: Option<ContactStatus>,
    ) -> Result<Vec<ContactMessage>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {MESSAGE_COLUMNS} FROM contact_messages WHERE TRUE"
        ));
        if let Some(form_type) = form_type {
            qb.push(" AND form_type = ").push_bind(form_type);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let messages = qb.build_query_as::<ContactMessage>().fetch_all(self.pool).await?;
        Ok(messages)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: ContactMessageId,
    ) -> Result<Option<ContactMessage>, RepositoryError> {
        let message = sqlx::query_as::<_, ContactMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM contact_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(message)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown message.
    pub async fn set_status(
        &self,
        id: ContactMessageId,
        status: ContactStatus,
    ) -> Result<ContactMessage, RepositoryError> {
        sqlx::query_as::<_, ContactMessage>(&format!(
            "UPDATE contact_messages SET status = $2 WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown message.
    pub async fn delete(&self, id: ContactMessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM contact_messages WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        require_affected(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM contact_messages WHERE status = 'unread'",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
