//! Payment claim submission and staff verification endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Money;
use domain::{SubmitPayment, VerifyPayment};
use event_store::{Catalog, EventStore};
use projections::PendingPayment;
use serde::{Deserialize, Serialize};

use super::orders::{OrderResponse, PaymentResponse};
use super::parse_aggregate_id;
use super::staff::Staff;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitPaymentRequest {
    pub order_id: String,
    pub amount_cents: i64,
    pub phone_number: String,
    pub transaction_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyActionRequest {
    Confirm,
    Reject,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub action: VerifyActionRequest,
    pub rejection_reason: Option<String>,
}

#[derive(Serialize)]
pub struct VerificationResponse {
    pub already_confirmed: bool,
    pub payment: Option<PaymentResponse>,
    pub order: OrderResponse,
}

/// POST /payments: a customer claims to have paid via M-Pesa.
#[tracing::instrument(skip(state, payload))]
pub async fn submit<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<SubmitPaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let Json(req) = payload?;
    let order_id = parse_aggregate_id(&req.order_id)?;

    let result = state
        .payments
        .submit_payment(SubmitPayment {
            order_id,
            amount: Money::from_cents(req.amount_cents),
            phone: req.phone_number,
            transaction_code: req.transaction_code,
        })
        .await?;
    state.wake_outbox();

    let payment = result
        .aggregate
        .payment()
        .map(PaymentResponse::from)
        .ok_or_else(|| ApiError::Internal("payment missing after submission".to_string()))?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// PUT /payments/verify/{order_id}: staff confirms or rejects the claim.
#[tracing::instrument(skip(state, staff, payload), fields(staff = %staff.0))]
pub async fn verify<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    staff: Staff,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<VerificationResponse>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    let Json(req) = payload?;

    let cmd = match req.action {
        VerifyActionRequest::Confirm => VerifyPayment::confirm(order_id, staff.0),
        VerifyActionRequest::Reject => VerifyPayment::reject(
            order_id,
            staff.0,
            req.rejection_reason.unwrap_or_default(),
        ),
    };

    let outcome = state.payments.verify_payment(cmd).await?;
    if !outcome.events.is_empty() {
        state.wake_outbox();
    }

    Ok(Json(VerificationResponse {
        already_confirmed: outcome.already_confirmed,
        payment: outcome.order.payment().map(PaymentResponse::from),
        order: OrderResponse::from(&outcome.order),
    }))
}

/// GET /payments/pending: the staff verification queue, oldest claim first.
#[tracing::instrument(skip(state, _staff))]
pub async fn pending<S: EventStore + Catalog + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _staff: Staff,
) -> Result<Json<Vec<PendingPayment>>, ApiError> {
    state.queue_processor.run_catch_up().await?;
    Ok(Json(state.payment_queue.pending().await))
}
