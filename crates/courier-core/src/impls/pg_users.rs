//! UserDirectory over the application's Postgres `"User"` table.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::error::CollaboratorError;
use crate::ports::{User, UserDirectory};

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily connecting pool: the first lookup opens the connection, so a
    /// database outage only affects notifications, never consumption.
    pub fn connect_lazy(database_url: &str) -> Result<Self, CollaboratorError> {
        let pool = PgPool::connect_lazy(database_url)
            .map_err(|e| CollaboratorError::Lookup(format!("invalid database url: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_user(&self, user_id: &str) -> Result<User, CollaboratorError> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT id, name, email
            FROM "User"
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CollaboratorError::Lookup(e.to_string()))?;

        let (id, name, email) =
            row.ok_or_else(|| CollaboratorError::UserNotFound(user_id.to_string()))?;
        debug!(user_id = %id, "resolved user");
        Ok(User { id, name, email })
    }
}
