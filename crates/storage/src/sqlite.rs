use crate::{connect, migrate, BlobStore};
use sqlx::SqlitePool;

/// Keeps blobs as rows of the `blobs` table.
#[derive(Debug, Clone)]
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        let pool = connect(database_url).await?;
        migrate(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl BlobStore for SqliteBlobStore {
    async fn read(&self, name: &str) -> anyhow::Result<Option<String>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM blobs WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body)
    }

    async fn write(&self, name: &str, body: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO blobs (name, body, updated_at)
            VALUES (?1, ?2, strftime('%s','now'))
            ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
