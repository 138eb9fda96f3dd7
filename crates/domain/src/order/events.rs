//! Order domain events.
//!
//! Payment events live on the order stream as well, so a single stream
//! version guards both the order status and its payment record.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, StaffId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{ContactDetails, Delivery, OrderLine, OrderStatus, OrderTotals};

/// Events that can occur on an order stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),

    OrderStatusChanged(OrderStatusChangedData),

    /// A customer claimed to have paid via M-Pesa.
    PaymentSubmitted(PaymentSubmittedData),

    PaymentConfirmed(PaymentConfirmedData),

    PaymentRejected(PaymentRejectedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            OrderEvent::PaymentSubmitted(_) => "PaymentSubmitted",
            OrderEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            OrderEvent::PaymentRejected(_) => "PaymentRejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub contact: ContactDetails,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub delivery: Delivery,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

/// What caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTrigger {
    /// Side effect of a payment confirmation.
    Payment,

    /// Explicit staff action.
    Staff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub trigger: StatusTrigger,
    pub changed_by: StaffId,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSubmittedData {
    pub amount: Money,
    /// Normalized MSISDN, e.g. `254712345678`.
    pub phone: String,
    /// Normalized upper-case M-Pesa receipt.
    pub transaction_code: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmedData {
    pub verified_by: StaffId,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRejectedData {
    pub verified_by: StaffId,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn status_changed(
        from: OrderStatus,
        to: OrderStatus,
        trigger: StatusTrigger,
        changed_by: StaffId,
        reason: Option<String>,
    ) -> Self {
        OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            from,
            to,
            trigger,
            changed_by,
            reason,
            changed_at: Utc::now(),
        })
    }

    pub fn payment_submitted(amount: Money, phone: String, transaction_code: String) -> Self {
        OrderEvent::PaymentSubmitted(PaymentSubmittedData {
            amount,
            phone,
            transaction_code,
            submitted_at: Utc::now(),
        })
    }

    pub fn payment_confirmed(verified_by: StaffId) -> Self {
        OrderEvent::PaymentConfirmed(PaymentConfirmedData {
            verified_by,
            verified_at: Utc::now(),
        })
    }

    pub fn payment_rejected(verified_by: StaffId, reason: impl Into<String>) -> Self {
        OrderEvent::PaymentRejected(PaymentRejectedData {
            verified_by,
            reason: reason.into(),
            rejected_at: Utc::now(),
        })
    }

    /// True for events recording a staff-initiated status change.
    pub fn is_staff_status_change(&self) -> bool {
        matches!(
            self,
            OrderEvent::OrderStatusChanged(data) if data.trigger == StatusTrigger::Staff
        )
    }
}
