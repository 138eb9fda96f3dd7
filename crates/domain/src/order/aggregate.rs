//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, ProductId, StaffId};
use event_store::{StockDecrement, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::{OrderError, ValidationError};
use crate::payment::{PaymentClaim, PaymentRecord, PaymentStatus};

use super::{
    ContactDetails, Delivery, OrderEvent, OrderLine, OrderStatus, OrderTotals, StatusTrigger,
    events::{OrderPlacedData, OrderStatusChangedData},
};

/// Order aggregate root.
///
/// Holds what was bought and for how much (frozen at checkout), the
/// fulfillment status and the embedded payment record. Only the status and
/// the payment record ever change after placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    contact: ContactDetails,

    lines: Vec<OrderLine>,

    totals: OrderTotals,

    delivery: Delivery,

    notes: Option<String>,

    status: OrderStatus,

    payment: Option<PaymentRecord>,

    created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::OrderStatusChanged(data) => self.apply_status_changed(data),
            OrderEvent::PaymentSubmitted(data) => {
                self.updated_at = data.submitted_at;
                if let Some(payment) = &mut self.payment {
                    payment.resubmitted(data);
                } else if let Some(order_id) = self.id {
                    self.payment = Some(PaymentRecord::submitted(order_id, data));
                }
            }
            OrderEvent::PaymentConfirmed(data) => {
                self.updated_at = data.verified_at;
                if let Some(payment) = &mut self.payment {
                    payment.confirmed(data);
                }
            }
            OrderEvent::PaymentRejected(data) => {
                self.updated_at = data.rejected_at;
                if let Some(payment) = &mut self.payment {
                    payment.rejected(data);
                }
            }
        }
    }
}

// Query methods
impl Order {
    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment(&self) -> Option<&PaymentRecord> {
        self.payment.as_ref()
    }

    /// Payment status as shown to customers. An order without a submitted
    /// claim reports `awaiting`.
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment
            .as_ref()
            .map(|p| p.status)
            .unwrap_or(PaymentStatus::Awaiting)
    }

    /// True once no command can change the order again: the status is final
    /// and no payment claim is left awaiting review.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
            && !self
                .payment
                .as_ref()
                .is_some_and(|payment| payment.status.can_verify())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> {
        self.lines
            .iter()
            .find(|line| &line.product_id == product_id)
            .map(|line| line.quantity)
    }

    /// One decrement per line, committed when the payment is confirmed.
    pub fn stock_decrements(&self) -> Vec<StockDecrement> {
        self.lines
            .iter()
            .map(|line| StockDecrement::new(line.product_id.clone(), line.quantity))
            .collect()
    }

    fn invalid_transition(&self, action: impl Into<String>) -> OrderError {
        let payment = match &self.payment {
            Some(record) => record.status.as_str(),
            None => "not submitted",
        };
        OrderError::InvalidTransition {
            action: action.into(),
            state: format!("order is {} and payment is {}", self.status, payment),
        }
    }

    fn ensure_placed(&self) -> Result<AggregateId, OrderError> {
        self.id.ok_or(OrderError::NotFound)
    }
}

// Command methods (return events)
impl Order {
    /// Places the order from already-priced lines.
    pub fn place(
        &self,
        order_id: AggregateId,
        contact: ContactDetails,
        lines: Vec<OrderLine>,
        totals: OrderTotals,
        delivery: Delivery,
        notes: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if lines.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
            return Err(ValidationError::InvalidQuantity {
                product_id: line.product_id.clone(),
                quantity: 0,
            }
            .into());
        }
        if !totals.is_consistent() || !totals.total.is_positive() {
            return Err(ValidationError::NonPositiveTotal(totals.total).into());
        }
        contact.validate()?;
        delivery.validate()?;

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            contact,
            lines,
            totals,
            delivery,
            notes,
            placed_at: Utc::now(),
        })])
    }

    /// Staff-driven status change along a legal edge.
    ///
    /// `pending → processing` is reserved for payment confirmation: staff
    /// cannot start fulfillment before a payment is confirmed.
    pub fn advance_status(
        &self,
        to: OrderStatus,
        changed_by: StaffId,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;

        let action = format!("move order to {to}");
        if !self.status.can_transition_to(to) {
            return Err(self.invalid_transition(action));
        }
        if to == OrderStatus::Processing && self.payment_status() != PaymentStatus::Confirmed {
            return Err(self.invalid_transition(format!("{action} without a confirmed payment")));
        }

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(vec![OrderEvent::status_changed(
            self.status,
            to,
            StatusTrigger::Staff,
            changed_by,
            reason,
        )])
    }

    /// Records a payment claim for review.
    pub fn submit_payment(&self, claim: PaymentClaim) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;

        if !self.status.accepts_payment() {
            return Err(self.invalid_transition("submit a payment"));
        }
        if let Some(payment) = &self.payment
            && !payment.status.accepts_resubmission()
        {
            return Err(self.invalid_transition("submit another payment"));
        }
        if claim.amount != self.totals.total {
            return Err(ValidationError::AmountMismatch {
                expected: self.totals.total,
                claimed: claim.amount,
            }
            .into());
        }

        Ok(vec![OrderEvent::payment_submitted(
            claim.amount,
            claim.phone,
            claim.transaction_code,
        )])
    }

    /// Confirms the payment under review and starts processing.
    ///
    /// Returns no events if the payment is already confirmed. The caller
    /// commits the returned events together with [`Order::stock_decrements`].
    pub fn confirm_payment(&self, verified_by: StaffId) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        let payment = self.payment.as_ref().ok_or(OrderError::PaymentNotSubmitted)?;

        match payment.status {
            PaymentStatus::Confirmed => Ok(vec![]),
            PaymentStatus::Rejected => Err(self.invalid_transition("confirm a rejected payment")),
            PaymentStatus::Awaiting => {
                if !self.status.accepts_payment() {
                    return Err(self.invalid_transition("confirm the payment"));
                }
                Ok(vec![
                    OrderEvent::payment_confirmed(verified_by.clone()),
                    OrderEvent::status_changed(
                        self.status,
                        OrderStatus::Processing,
                        StatusTrigger::Payment,
                        verified_by,
                        None,
                    ),
                ])
            }
        }
    }

    /// Rejects the payment under review. The order stays `pending`.
    pub fn reject_payment(
        &self,
        verified_by: StaffId,
        reason: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        let payment = self.payment.as_ref().ok_or(OrderError::PaymentNotSubmitted)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingRejectionReason.into());
        }
        if !payment.status.can_verify() {
            return Err(self.invalid_transition("reject the payment"));
        }

        Ok(vec![OrderEvent::payment_rejected(verified_by, reason)])
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.contact = data.contact;
        self.lines = data.lines;
        self.totals = data.totals;
        self.delivery = data.delivery;
        self.notes = data.notes;
        self.status = OrderStatus::Pending;
        self.created_at = data.placed_at;
        self.updated_at = data.placed_at;
    }

    fn apply_status_changed(&mut self, data: OrderStatusChangedData) {
        self.status = data.to;
        self.updated_at = data.changed_at;
    }
}
