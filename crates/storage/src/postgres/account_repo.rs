//! Account repository implementation for PostgreSQL.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cosmoscan_core::error::{StorageError, StorageResult};
use cosmoscan_core::models::Account;
use cosmoscan_core::ports::{AccountFilter, AccountRepository};

use super::database::Database;
use super::helpers::insert_all;

/// PostgreSQL implementation of AccountRepository.
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create_accounts(&self, accounts: &[Account]) -> StorageResult<()> {
        insert_all(
            &self.pool,
            "INSERT INTO accounts (address, balance, stake, unbonding, created_at) ",
            "ON CONFLICT (address) DO NOTHING",
            accounts,
            |mut row, account| {
                row.push_bind(account.address.clone())
                    .push_bind(account.balance.clone())
                    .push_bind(account.stake.clone())
                    .push_bind(account.unbonding.clone())
                    .push_bind(account.created_at);
            },
        )
        .await
    }

    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT address, balance, stake, unbonding, created_at
            FROM accounts
            WHERE cardinality($1::TEXT[]) = 0 OR address = ANY($1)
            "#,
        )
        .bind(&filter.addresses)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(rows.into_iter().map(AccountRow::into_account).collect())
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    address: String,
    balance: BigDecimal,
    stake: BigDecimal,
    unbonding: BigDecimal,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> Account {
        Account {
            address: self.address,
            balance: self.balance,
            stake: self.stake,
            unbonding: self.unbonding,
            created_at: self.created_at,
        }
    }
}
