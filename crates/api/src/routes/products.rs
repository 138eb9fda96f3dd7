//! Minimal catalog endpoints for seeding products and reading stock.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::{Money, ProductId};
use event_store::{Catalog, EventStore, Product};
use serde::{Deserialize, Serialize};

use super::staff::Staff;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpsertProductRequest {
    pub name: String,
    pub unit_price_cents: i64,
    pub stock: u32,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub stock: u32,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            unit_price_cents: product.unit_price.cents(),
            stock: product.stock,
        }
    }
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .store
        .get_product(&ProductId::new(id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(product.into()))
}

/// PUT /products/{id}: staff creates or replaces a product with its stock.
#[tracing::instrument(skip(state, staff, payload), fields(staff = %staff.0))]
pub async fn upsert<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    staff: Staff,
    payload: Result<Json<UpsertProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Json(req) = payload?;
    if id.trim().is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("product id and name are required".into()));
    }
    if req.unit_price_cents <= 0 {
        return Err(ApiError::BadRequest("unit price must be positive".into()));
    }

    let product = Product::new(
        id.trim(),
        req.name.trim(),
        Money::from_cents(req.unit_price_cents),
        req.stock,
    );
    state.store.upsert_product(product.clone()).await?;
    tracing::info!(product_id = %product.id, stock = product.stock, "product upserted");

    Ok(Json(product.into()))
}
