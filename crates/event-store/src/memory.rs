use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, Catalog, EventEnvelope, EventStoreError, Product, ProductId, Result, Version,
    store::{Commit, EventStore, EventStream, check_stream_version},
};

#[derive(Default)]
struct StoreState {
    events: Vec<EventEnvelope>,
    versions: HashMap<AggregateId, Version>,
    products: HashMap<ProductId, Product>,
}

/// In-memory event store and catalog.
///
/// Events and stock live behind a single lock, so a [`Commit`] is checked
/// and applied without any other writer interleaving.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Clears all events and products.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = StoreState::default();
    }
}

fn check_stock(products: &HashMap<ProductId, Product>, id: &ProductId, requested: u32) -> Result<()> {
    let product = products
        .get(id)
        .ok_or_else(|| EventStoreError::ProductNotFound(id.clone()))?;
    if product.stock < requested {
        return Err(EventStoreError::InsufficientStock {
            product_id: id.clone(),
            requested,
            available: product.stock,
        });
    }
    Ok(())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, commit: Commit) -> Result<Vec<Version>> {
        commit.validate()?;
        let stock_totals = commit.stock_totals();

        let mut state = self.state.write().await;

        for append in &commit.appends {
            let aggregate_id = append.events[0].aggregate_id;
            let current = state
                .versions
                .get(&aggregate_id)
                .copied()
                .unwrap_or(Version::initial());
            check_stream_version(append, current)?;
        }
        for (product_id, quantity) in &stock_totals {
            check_stock(&state.products, product_id, *quantity)?;
        }

        // Every check passed; nothing below can fail.
        for (product_id, quantity) in stock_totals {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock -= quantity;
            }
        }

        let mut new_versions = Vec::with_capacity(commit.appends.len());
        for append in commit.appends {
            let aggregate_id = append.events[0].aggregate_id;
            let last_version = append
                .events
                .last()
                .map(|e| e.version)
                .unwrap_or(Version::initial());
            state.versions.insert(aggregate_id, last_version);
            state.events.extend(append.events);
            new_versions.push(last_version);
        }

        Ok(new_versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn stream_events_from(&self, skip: u64) -> Result<EventStream> {
        use futures_util::stream;

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let tail: Vec<EventEnvelope> = {
            let state = self.state.read().await;
            state.events.iter().skip(skip).cloned().collect()
        };
        Ok(Box::pin(stream::iter(tail.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.state.read().await.versions.get(&aggregate_id).copied())
    }
}

#[async_trait]
impl Catalog for InMemoryEventStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<u32> {
        let mut state = self.state.write().await;
        check_stock(&state.products, id, quantity)?;
        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| EventStoreError::ProductNotFound(id.clone()))?;
        product.stock -= quantity;
        Ok(product.stock)
    }

    async fn restock(&self, id: &ProductId, quantity: u32) -> Result<u32> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| EventStoreError::ProductNotFound(id.clone()))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(product.stock)
    }
}
