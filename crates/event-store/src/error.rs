use thiserror::Error;

use crate::{AggregateId, ProductId, Version};

/// Errors that can occur when interacting with the event store or catalog.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream moved on since it was loaded. Nothing from the commit was
    /// written.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A conditional stock decrement found less stock than requested.
    /// Nothing from the commit was written.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The commit itself was malformed (empty, mixed streams, gaps in versions).
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// True for conflicts a caller can resolve by reloading and retrying.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
