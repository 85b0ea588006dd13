//! Checkpoint repository implementation for PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;

use cosmoscan_core::error::{StorageError, StorageResult};
use cosmoscan_core::models::ParserCheckpoint;
use cosmoscan_core::ports::CheckpointRepository;

use super::database::Database;
use super::helpers::i64_to_u64;

/// PostgreSQL implementation of CheckpointRepository.
pub struct PgCheckpointRepository {
    pool: PgPool,
}

impl PgCheckpointRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl CheckpointRepository for PgCheckpointRepository {
    async fn get_or_create(&self, title: &str) -> StorageResult<ParserCheckpoint> {
        sqlx::query(
            r#"
            INSERT INTO parsers (title, height)
            VALUES ($1, 0)
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .bind(title)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        let row = sqlx::query_as::<_, CheckpointRow>(
            r#"
            SELECT id, title, height
            FROM parsers
            WHERE title = $1
            "#,
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        row.into_checkpoint()
    }

    async fn set_checkpoint(&self, title: &str, height: u64) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE parsers
            SET height = $2
            WHERE title = $1
            "#,
        )
        .bind(title)
        .bind(height as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("parser checkpoint {title}")));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    id: i64,
    title: String,
    height: i64,
}

impl CheckpointRow {
    fn into_checkpoint(self) -> StorageResult<ParserCheckpoint> {
        Ok(ParserCheckpoint {
            id: self.id,
            title: self.title,
            height: i64_to_u64(self.height, "parsers.height")?,
        })
    }
}
