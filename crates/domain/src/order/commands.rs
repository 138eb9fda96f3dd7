//! Order commands.

use common::{AggregateId, StaffId};

use crate::command::Command;

use super::{CartItem, ContactDetails, Delivery, Order, OrderStatus};

/// Checkout: turns a cart into a pending order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,

    /// Cart entries as submitted. Duplicates are merged during placement.
    pub items: Vec<CartItem>,

    pub delivery: Delivery,

    pub contact: ContactDetails,

    pub notes: Option<String>,
}

impl PlaceOrder {
    /// Creates a PlaceOrder command with a generated order ID.
    pub fn new(items: Vec<CartItem>, delivery: Delivery, contact: ContactDetails) -> Self {
        Self {
            order_id: AggregateId::new(),
            items,
            delivery,
            contact,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Staff moves an order along its fulfillment lifecycle.
#[derive(Debug, Clone)]
pub struct AdvanceStatus {
    pub order_id: AggregateId,

    pub status: OrderStatus,

    pub changed_by: StaffId,

    pub reason: Option<String>,
}

impl AdvanceStatus {
    pub fn new(order_id: AggregateId, status: OrderStatus, changed_by: StaffId) -> Self {
        Self {
            order_id,
            status,
            changed_by,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Command for AdvanceStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
