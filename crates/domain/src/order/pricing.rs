//! Server-side pricing of a checkout.

use common::Money;
use serde::{Deserialize, Serialize};

use super::{Delivery, OrderLine, OrderTotals};
use crate::error::ValidationError;

/// Shipping rules applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Flat fee for delivery to an address.
    pub delivery_fee: Money,

    /// Subtotal at or above which delivery is free.
    pub free_delivery_threshold: Option<Money>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            delivery_fee: Money::from_shillings(300),
            free_delivery_threshold: None,
        }
    }
}

impl PricingPolicy {
    pub fn new(delivery_fee: Money, free_delivery_threshold: Option<Money>) -> Self {
        Self {
            delivery_fee,
            free_delivery_threshold,
        }
    }

    pub fn shipping_for(&self, delivery: &Delivery, subtotal: Money) -> Money {
        if delivery.is_pickup() {
            return Money::zero();
        }
        match self.free_delivery_threshold {
            Some(threshold) if subtotal >= threshold => Money::zero(),
            _ => self.delivery_fee,
        }
    }

    /// No promotions exist yet, so checkout never discounts.
    pub fn discount_for(&self, _subtotal: Money) -> Money {
        Money::zero()
    }

    /// Prices the lines, failing when any amount leaves the `i64` range.
    pub fn totals(
        &self,
        lines: &[OrderLine],
        delivery: &Delivery,
    ) -> Result<OrderTotals, ValidationError> {
        let mut subtotal = Money::zero();
        for line in lines {
            subtotal = subtotal
                .checked_add(line.line_total()?)
                .ok_or(ValidationError::AmountOverflow)?;
        }

        let shipping = self.shipping_for(delivery, subtotal);
        let discount = self.discount_for(subtotal);
        let total = subtotal
            .checked_add(shipping)
            .and_then(|t| t.checked_sub(discount))
            .ok_or(ValidationError::AmountOverflow)?;

        Ok(OrderTotals {
            subtotal,
            shipping,
            discount,
            total,
        })
    }
}
