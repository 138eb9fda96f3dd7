//! What gets sent to customers.

use common::AggregateId;
use domain::{Aggregate, Order, OrderEvent};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Payment confirmed; the order is being processed.
    OrderConfirmed,

    /// The payment claim was rejected and may be resubmitted.
    PaymentRejected,

    /// Staff moved the order to a new status.
    OrderStatusChanged,
}

impl NotificationKind {
    /// The notification an event triggers, if any.
    ///
    /// A confirmation is announced on the status change it causes, so the
    /// customer sees the order already in `processing`; that status change
    /// is not announced a second time.
    pub fn for_event(event: &OrderEvent) -> Option<Self> {
        match event {
            OrderEvent::PaymentRejected(_) => Some(NotificationKind::PaymentRejected),
            event if event.is_staff_status_change() => Some(NotificationKind::OrderStatusChanged),
            OrderEvent::OrderStatusChanged(_) => Some(NotificationKind::OrderConfirmed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderConfirmed => "order_confirmed",
            NotificationKind::PaymentRejected => "payment_rejected",
            NotificationKind::OrderStatusChanged => "order_status_changed",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification with the order as it stood right after the triggering
/// event, payment record included.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub order: Order,
}

impl Notification {
    pub fn new(kind: NotificationKind, order: Order) -> Self {
        Self { kind, order }
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order.id()
    }

    pub fn recipient(&self) -> &str {
        &self.order.contact().email
    }
}
