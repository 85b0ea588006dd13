//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in `cosmoscan-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool, migrations and purge
//! - [`PgRepositories`] - Composite repository implementing `Repositories` trait
//! - Individual repos: `PgCheckpointRepository`, `PgFactRepository`, `PgAccountRepository`
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_parser(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(&db);
//! ```

mod account_repo;
mod checkpoint_repo;
mod database;
mod fact_repo;
mod helpers;

pub use account_repo::PgAccountRepository;
pub use checkpoint_repo::PgCheckpointRepository;
pub use database::{Database, DatabaseConfig, PurgeStats};
pub use fact_repo::PgFactRepository;

use cosmoscan_core::ports::{AccountRepository, CheckpointRepository, FactRepository, Repositories};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories` trait.
pub struct PgRepositories {
    checkpoints: PgCheckpointRepository,
    facts: PgFactRepository,
    accounts: PgAccountRepository,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: &Database) -> Self {
        Self {
            checkpoints: PgCheckpointRepository::new(db),
            facts: PgFactRepository::new(db),
            accounts: PgAccountRepository::new(db),
        }
    }
}

impl Repositories for PgRepositories {
    fn checkpoints(&self) -> &dyn CheckpointRepository {
        &self.checkpoints
    }

    fn facts(&self) -> &dyn FactRepository {
        &self.facts
    }

    fn accounts(&self) -> &dyn AccountRepository {
        &self.accounts
    }
}
