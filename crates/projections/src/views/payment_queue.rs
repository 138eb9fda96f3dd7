//! Payment queue read model: claims waiting for staff verification.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, Money, OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// A payment claim awaiting verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingPayment {
    pub order_id: AggregateId,
    pub customer_name: String,
    pub customer_email: String,
    pub order_total: Money,
    pub amount: Money,
    pub phone: String,
    pub transaction_code: String,
    pub submitted_at: DateTime<Utc>,
    /// 1 for the first claim, higher after rejections.
    pub submission_count: u32,
}

/// What the queue remembers about an order between its events.
struct OrderInfo {
    customer_name: String,
    customer_email: String,
    total: Money,
    submissions: u32,
}

#[derive(Default)]
struct QueueState {
    orders: HashMap<AggregateId, OrderInfo>,
    /// In log order, which is submission order.
    pending: Vec<PendingPayment>,
    position: ProjectionPosition,
}

/// The staff verification queue.
///
/// An order is listed while its latest claim is `awaiting`. It leaves the
/// queue when the claim is confirmed or rejected, or when the order is
/// cancelled.
#[derive(Clone, Default)]
pub struct PaymentQueueView {
    state: Arc<RwLock<QueueState>>,
}

impl PaymentQueueView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims awaiting verification, oldest first.
    pub async fn pending(&self) -> Vec<PendingPayment> {
        self.state.read().await.pending.clone()
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<PendingPayment> {
        self.state
            .read()
            .await
            .pending
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned()
    }
}

#[async_trait]
impl Projection for PaymentQueueView {
    fn name(&self) -> &'static str {
        "PaymentQueueView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.position = state.position.advance();

        if event.aggregate_type != domain::Order::aggregate_type() {
            return Ok(());
        }

        let order_id = event.aggregate_id;
        match event.decode::<OrderEvent>()? {
            OrderEvent::OrderPlaced(data) => {
                state.orders.insert(
                    order_id,
                    OrderInfo {
                        customer_name: data.contact.name,
                        customer_email: data.contact.email,
                        total: data.totals.total,
                        submissions: 0,
                    },
                );
            }
            OrderEvent::PaymentSubmitted(data) => {
                if let Some(info) = state.orders.get_mut(&order_id) {
                    info.submissions += 1;
                    let entry = PendingPayment {
                        order_id,
                        customer_name: info.customer_name.clone(),
                        customer_email: info.customer_email.clone(),
                        order_total: info.total,
                        amount: data.amount,
                        phone: data.phone,
                        transaction_code: data.transaction_code,
                        submitted_at: data.submitted_at,
                        submission_count: info.submissions,
                    };
                    state.pending.retain(|p| p.order_id != order_id);
                    state.pending.push(entry);
                }
            }
            OrderEvent::PaymentConfirmed(_) | OrderEvent::PaymentRejected(_) => {
                state.pending.retain(|p| p.order_id != order_id);
            }
            OrderEvent::OrderStatusChanged(data) => {
                if data.to == OrderStatus::Cancelled {
                    state.pending.retain(|p| p.order_id != order_id);
                }
                if data.to.is_terminal() {
                    state.orders.remove(&order_id);
                }
            }
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = QueueState::default();
        Ok(())
    }
}

impl ReadModel for PaymentQueueView {
    fn name(&self) -> &'static str {
        "PaymentQueueView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.pending.len()).unwrap_or(0)
    }
}
