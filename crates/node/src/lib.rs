//! Cosmos LCD adapter for the cosmoscan indexer.
//!
//! This crate implements the [`ChainNode`] port from `cosmoscan-core`,
//! talking to a Cosmos-SDK full node through its REST (LCD) API.
//!
//! # Features
//!
//! - Blocks, paged validator sets and transaction details
//! - Genesis document from an `http(s)://` URL or a local file
//! - Non-success responses surface as `ChainError::BadStatus` with a
//!   truncated body
//!
//! # Usage
//!
//! ```ignore
//! use cosmoscan_node::{LcdClient, LcdClientConfig};
//!
//! let client = LcdClient::new(LcdClientConfig {
//!     base_url: "http://localhost:1317".to_string(),
//!     ..Default::default()
//! })?;
//! let latest = client.latest_block().await?;
//! ```
//!
//! [`ChainNode`]: cosmoscan_core::ports::ChainNode

mod client;

pub use client::{DEFAULT_GENESIS_SOURCE, GenesisSource, LcdClient, LcdClientConfig};
