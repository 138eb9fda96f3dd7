//! Checkout, order lookup and staff status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{
    AdvanceStatus, AuditOutcome, CartItem, ContactDetails, Delivery, Order, OrderStatus,
    PaymentRecord, PlaceOrder,
};
use event_store::{Catalog, EventStore};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use super::staff::Staff;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CartItemRequest>,
    #[serde(default)]
    pub delivery: Delivery,
    pub contact: ContactDetails,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: OrderStatus,
    pub contact: ContactDetails,
    pub delivery: Delivery,
    pub notes: Option<String>,
    pub lines: Vec<OrderLineResponse>,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment: Option<PaymentResponse>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub order_id: String,
    pub amount_cents: i64,
    pub phone_number: String,
    pub transaction_code: String,
    pub status: domain::PaymentStatus,
    pub submitted_at: DateTime<Utc>,
    pub submission_count: u32,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub audit_trail: Vec<AuditEntryResponse>,
}

#[derive(Serialize)]
pub struct AuditEntryResponse {
    pub outcome: AuditOutcome,
    pub amount_cents: i64,
    pub transaction_code: String,
    pub verified_by: String,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl From<&PaymentRecord> for PaymentResponse {
    fn from(payment: &PaymentRecord) -> Self {
        Self {
            order_id: payment.order_id.to_string(),
            amount_cents: payment.amount.cents(),
            phone_number: payment.phone.clone(),
            transaction_code: payment.transaction_code.clone(),
            status: payment.status,
            submitted_at: payment.submitted_at,
            submission_count: payment.submission_count,
            verified_at: payment.verified_at,
            verified_by: payment.verified_by.as_ref().map(|s| s.to_string()),
            rejection_reason: payment.rejection_reason.clone(),
            audit_trail: payment
                .audit_trail
                .iter()
                .map(|entry| AuditEntryResponse {
                    outcome: entry.outcome,
                    amount_cents: entry.amount.cents(),
                    transaction_code: entry.transaction_code.clone(),
                    verified_by: entry.verified_by.to_string(),
                    reason: entry.reason.clone(),
                    at: entry.at,
                })
                .collect(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        use domain::Aggregate;

        let totals = order.totals();
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            status: order.status(),
            contact: order.contact().clone(),
            delivery: order.delivery().clone(),
            notes: order.notes().map(String::from),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id.to_string(),
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    line_total_cents: line.unit_price.times(line.quantity).cents(),
                })
                .collect(),
            subtotal_cents: totals.subtotal.cents(),
            shipping_cents: totals.shipping.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            payment: order.payment().map(PaymentResponse::from),
            version: order.version().as_i64(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /orders: checkout.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload?;

    let items = req
        .items
        .into_iter()
        .map(|item| CartItem::new(item.product_id, item.quantity))
        .collect();
    let mut cmd = PlaceOrder::new(items, req.delivery, req.contact);
    if let Some(notes) = req.notes {
        cmd = cmd.with_notes(notes);
    }

    let result = state.orders.place_order(cmd).await?;
    state.wake_outbox();

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&result.aggregate))))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/status: staff moves an order along its lifecycle.
#[tracing::instrument(skip(state, staff, payload), fields(staff = %staff.0))]
pub async fn update_status<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    staff: Staff,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let Json(req) = payload?;
    let status: OrderStatus = req.status.parse().map_err(ApiError::BadRequest)?;

    let mut cmd = AdvanceStatus::new(order_id, status, staff.0);
    if let Some(reason) = req.reason {
        cmd = cmd.with_reason(reason);
    }

    let result = state.orders.advance_status(cmd).await?;
    state.wake_outbox();

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

/// GET /orders/{id}/events: the order's audit history.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let envelopes = state.orders.order_events(order_id).await?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Order {id} not found")));
    }

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            actor: e.actor().map(String::from),
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp,
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}
