use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId, Result};

/// A catalog product with its live stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, unit_price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            stock,
        }
    }
}

/// Product catalog and stock ledger.
///
/// Stock only ever changes through a conditional decrement (which never
/// lets a count drop below zero) or an explicit restock.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Creates or replaces a product, including its stock level.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Removes `quantity` units if at least that many are in stock.
    ///
    /// Returns the remaining stock, or `InsufficientStock` with the stock
    /// left untouched.
    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<u32>;

    /// Adds `quantity` units and returns the new stock level.
    async fn restock(&self, id: &ProductId, quantity: u32) -> Result<u32>;
}
