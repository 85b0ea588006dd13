//! Error types for the parser domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DecodeError`] - Structural failures while decoding chain messages
//! - [`StorageError`] - Database/repository errors
//! - [`ChainError`] - Remote node errors
//! - [`IndexerError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// Structural errors raised while turning a chain message into facts.
///
/// Chain data is expected to be internally consistent, so any of these
/// fails the whole height and forces a refetch.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An amount list carried more than one denomination.
    #[error("Mixed denominations in amount: {first} and {second}")]
    MixedDenoms {
        /// First denomination seen.
        first: String,
        /// Conflicting denomination.
        second: String,
    },

    /// Amount was expected in the main denomination.
    #[error("Unexpected denomination: {0}")]
    UnexpectedDenom(String),

    /// Amount string is not an integer/decimal number.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// An event or attribute the message depends on is absent.
    #[error("Missing event data: {0}")]
    MissingEvent(String),

    /// Vote option outside the known set.
    #[error("Unknown vote option: {0}")]
    UnknownVoteOption(String),

    /// Message JSON does not match the expected shape.
    #[error("Malformed {message}: {reason}")]
    Malformed {
        /// Message type URL.
        message: String,
        /// Deserialization error details.
        reason: String,
    },

    /// Raw block transaction bytes are not valid base64.
    #[error("Invalid transaction encoding: {0}")]
    InvalidTxEncoding(String),

    /// Validator public key is not a base64 ed25519 key.
    #[error("Invalid validator key: {0}")]
    InvalidValidatorKey(String),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and data serialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Remote node errors.
///
/// Every variant is treated as transient by the parser.
#[derive(Debug, Error)]
pub enum ChainError {
    /// HTTP request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Node answered with a non-success status.
    #[error("Bad status {status} for {endpoint}: {body}")]
    BadStatus {
        /// Requested endpoint.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse {
        /// Requested endpoint.
        endpoint: String,
        /// Error details.
        message: String,
    },

    /// Genesis document could not be read.
    #[error("Genesis unavailable: {0}")]
    GenesisUnavailable(String),
}

// =============================================================================
// Indexer Errors
// =============================================================================

/// Top-level parser orchestration errors.
///
/// This is the main error type returned by [`crate::services::Parser`].
/// It wraps all lower-level errors and adds parser-specific variants.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Message decoding error.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote node error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Genesis import failed.
    ///
    /// This is fatal: the parser refuses to start on a partial import.
    #[error("Genesis import failed: {0}")]
    Genesis(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parser operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
