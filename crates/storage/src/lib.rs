//! Storage layer for the cosmoscan indexer.
//!
//! This crate provides PostgreSQL implementations of the repository traits
//! defined in `cosmoscan-core`. It handles connection pooling, migrations,
//! idempotent fact inserts and checkpoint bookkeeping.
//!
//! # Architecture
//!
//! The storage layer follows the repository pattern:
//!
//! - [`postgres::Database`] - Connection pool management
//! - [`postgres::PgRepositories`] - Composite repository for all entity types
//! - Individual repositories for checkpoints, facts and accounts
//!
//! # Usage
//!
//! ```ignore
//! use cosmoscan_storage::{Database, DatabaseConfig, PgRepositories};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_parser(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! // Create repositories
//! let repositories = Arc::new(PgRepositories::new(&db));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgRepositories, PurgeStats};
