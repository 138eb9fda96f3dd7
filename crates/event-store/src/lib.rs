//! Persistence for the storefront core.
//!
//! - an append-only event log keyed by aggregate id, guarded by optimistic
//!   concurrency on [`Version`]
//! - [`Commit`]: several stream appends plus conditional stock decrements
//!   applied all-or-nothing
//! - the product [`Catalog`] holding the per-product stock ledger

pub mod catalog;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use catalog::{Catalog, Product};
pub use common::{AggregateId, Money, ProductId};
pub use error::{EventStoreError, Result};
pub use event::{
    ACTOR_METADATA_KEY, EnvelopeError, EventEnvelope, EventEnvelopeBuilder, EventId, Version,
};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{
    AppendOptions, Commit, EventStore, EventStoreExt, EventStream, StockDecrement, StreamAppend,
};
