//! Core domain layer for the cosmoscan parser.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic services for the Cosmos-SDK chain parser. It follows
//! hexagonal architecture principles - this is the innermost layer with
//! no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    cosmoscan (binary)                       │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │       cosmoscan-node         │      cosmoscan-storage       │
//! │       (LCD / REST)           │        (PostgreSQL)          │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                    cosmoscan-core  ← YOU ARE HERE           │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Block, Transaction, Transfer, etc.)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Core business logic (Parser, workers, committer)
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::ChainNode`] - Fetch blocks, validator sets, transactions and
//!   the genesis document from a full node
//! - [`ports::Repositories`] - Persist facts, accounts and checkpoints
//!
//! ## Pipeline
//!
//! ```text
//! scheduler ──heights──▶ fetch workers (N) ──HeightFacts──▶ committer ──▶ storage
//!     ▲                                                         │
//!     └────────────────────── checkpoint ◀──────────────────────┘
//! ```
//!
//! 1. The scheduler enqueues every height above its cursor
//! 2. Workers fetch and decode a height, retrying it as a whole on failure
//! 3. The committer persists only runs contiguous with the checkpoint
//! 4. The checkpoint advances after all facts of the run are stored

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
