//! Shared helpers for PostgreSQL row conversion and batch inserts.

use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::QueryBuilder;
use sqlx::query_builder::Separated;

use cosmoscan_core::error::{StorageError, StorageResult};

/// Rows per `INSERT` statement, well below the 65535 bind parameter limit.
pub const ROWS_PER_STATEMENT: usize = 1000;

/// Convert a signed column to `u64`, rejecting negative values as corrupt.
pub fn i64_to_u64(value: i64, field_name: &str) -> StorageResult<u64> {
    u64::try_from(value).map_err(|_| {
        StorageError::SerializationError(format!(
            "{} is negative ({}), which indicates data corruption",
            field_name, value
        ))
    })
}

/// Insert `rows` in a single database transaction.
///
/// `insert` is the `INSERT INTO table (columns) ` prefix and `conflict` the
/// trailing `ON CONFLICT` clause. Empty slices do not touch the database.
pub async fn insert_all<T, F>(
    pool: &PgPool,
    insert: &'static str,
    conflict: &'static str,
    rows: &[T],
    mut bind_row: F,
) -> StorageResult<()>
where
    T: Sync,
    F: FnMut(Separated<'_, 'static, Postgres, &'static str>, &T) + Send,
{
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::TransactionError(e.to_string()))?;

    for chunk in rows.chunks(ROWS_PER_STATEMENT) {
        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(insert);
        builder.push_values(chunk, |values, row| bind_row(values, row));
        builder.push(" ");
        builder.push(conflict);

        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| StorageError::TransactionError(e.to_string()))?;

    Ok(())
}
