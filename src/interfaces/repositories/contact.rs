use async_trait::async_trait;

use crate::{entities::contact::ContactSubmission, errors::StoreError, repositories::sqlx_repo::SqlxContactStore};

/// Write side of the external record store, narrowed to the one call the
/// intake pipeline makes.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Persists one submission. Either every field is written or nothing is.
    async fn create(&self, submission: &ContactSubmission) -> Result<(), StoreError>;

    /// Short name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Reachability check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl SqlxContactStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        SqlxContactStore { pool }
    }
}

#[async_trait]
impl ContactStore for SqlxContactStore {
    #[tracing::instrument(name = "Insert contact submission", skip_all)]
    async fn create(&self, submission: &ContactSubmission) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contacts (name, email, subject, message, read, created_at, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&submission.name)
        .bind(&submission.email)
        .bind(&submission.subject)
        .bind(&submission.message)
        .bind(submission.read)
        .bind(submission.created_at)
        .bind(submission.user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
