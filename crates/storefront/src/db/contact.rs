//! Contact and valuation form submissions.

use sqlx::PgPool;

use desguace_core::{ContactFormType, ContactMessage};

use super::RepositoryError;

/// A validated form submission.
#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub form_type: ContactFormType,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub form_data: Option<serde_json::Value>,
}

/// Repository for storing contact messages.
pub struct ContactRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactRepository<'a> {
    /// Create a new contact repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a submission as unread.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewContactMessage) -> Result<ContactMessage, RepositoryError> {
        let message = sqlx::query_as::<_, ContactMessage>(
            r"
            INSERT INTO contact_messages (form_type, name, email, phone, subject, message, form_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, form_type, name, email, phone, subject, message, form_data, status,
                      created_at
            ",
        )
        .bind(new.form_type)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.subject)
        .bind(&new.message)
        .bind(&new.form_data)
        .fetch_one(self.pool)
        .await?;
        Ok(message)
    }
}
