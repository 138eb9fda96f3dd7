use std::collections::{BTreeMap, HashSet};
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, ProductId, Result, Version};

/// Options for appending events to one stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the stream for optimistic concurrency control.
    /// If None, only version contiguity is checked.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to have no events yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Conditional stock decrement applied as part of a [`Commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockDecrement {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Events for one stream together with their concurrency expectation.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

/// A unit of work applied all-or-nothing.
///
/// Every stream append must pass its version check and every product must
/// hold enough stock; otherwise nothing is written.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    pub appends: Vec<StreamAppend>,
    pub stock_decrements: Vec<StockDecrement>,
}

impl Commit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        self.appends.push(StreamAppend { events, options });
        self
    }

    pub fn decrement_stock(mut self, decrement: StockDecrement) -> Self {
        self.stock_decrements.push(decrement);
        self
    }

    pub fn decrement_all(mut self, decrements: impl IntoIterator<Item = StockDecrement>) -> Self {
        self.stock_decrements.extend(decrements);
        self
    }

    /// Total quantity per product, in product id order.
    ///
    /// Stores apply decrements in this order so concurrent commits touching
    /// the same products always lock them in the same sequence.
    pub fn stock_totals(&self) -> BTreeMap<ProductId, u32> {
        let mut totals = BTreeMap::new();
        for decrement in &self.stock_decrements {
            let entry = totals.entry(decrement.product_id.clone()).or_insert(0u32);
            *entry = entry.saturating_add(decrement.quantity);
        }
        totals
    }

    /// Checks the shape of the commit before any store touches it.
    pub fn validate(&self) -> Result<()> {
        if self.appends.is_empty() && self.stock_decrements.is_empty() {
            return Err(EventStoreError::InvalidAppend(
                "Cannot apply an empty commit".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for append in &self.appends {
            validate_events_for_append(&append.events)?;
            let aggregate_id = append.events[0].aggregate_id;
            if !seen.insert(aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "Aggregate {aggregate_id} appears twice in one commit"
                )));
            }
        }

        if self.stock_decrements.iter().any(|d| d.quantity == 0) {
            return Err(EventStoreError::InvalidAppend(
                "Stock decrements must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Applies a commit atomically.
    ///
    /// Returns the new version of each appended stream, in commit order.
    async fn commit(&self, commit: Commit) -> Result<Vec<Version>>;

    /// Retrieves all events for a stream, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams the log in commit order, skipping the first `skip` events.
    async fn stream_events_from(&self, skip: u64) -> Result<EventStream>;

    /// Streams every event in the store in commit order.
    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_from(0).await
    }

    /// Gets the current version of a stream, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let versions = self.commit(Commit::new().append(events, options)).await?;
        versions.into_iter().next().ok_or_else(|| {
            EventStoreError::InvalidAppend("Commit returned no stream version".to_string())
        })
    }
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if a stream has any events.
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates the events of a single stream append.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

/// Checks a stream append against the stream's current version.
pub(crate) fn check_stream_version(append: &StreamAppend, current: Version) -> Result<()> {
    let first = &append.events[0];
    if let Some(expected) = append.options.expected_version
        && current != expected
    {
        return Err(EventStoreError::ConcurrencyConflict {
            aggregate_id: first.aggregate_id,
            expected,
            actual: current,
        });
    }
    if first.version != current.next() {
        return Err(EventStoreError::ConcurrencyConflict {
            aggregate_id: first.aggregate_id,
            expected: Version::new(first.version.as_i64() - 1),
            actual: current,
        });
    }
    Ok(())
}
