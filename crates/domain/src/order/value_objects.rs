//! Value objects for the order domain.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A cart entry as submitted by the customer. Prices are never taken from
/// the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Merges cart entries for the same product, keeping first-appearance order.
pub(crate) fn merge_cart(items: &[CartItem]) -> Vec<CartItem> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item.clone()),
        }
    }
    merged
}

/// A priced line of a placed order. The unit price is frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Result<Money, ValidationError> {
        self.unit_price
            .checked_times(self.quantity)
            .ok_or(ValidationError::AmountOverflow)
    }
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Builds totals with `total = subtotal + shipping - discount`.
    pub fn new(subtotal: Money, shipping: Money, discount: Money) -> Self {
        Self {
            subtotal,
            shipping,
            discount,
            total: subtotal + shipping - discount,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.shipping - self.discount
    }
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Delivery {
    /// Collected from the shop.
    #[default]
    Pickup,

    Address {
        recipient: String,
        phone: String,
        address: String,
        city: String,
    },
}

impl Delivery {
    pub fn is_pickup(&self) -> bool {
        matches!(self, Delivery::Pickup)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let Delivery::Address {
            recipient,
            phone,
            address,
            city,
        } = self
        else {
            return Ok(());
        };

        if recipient.trim().is_empty() {
            return Err(ValidationError::InvalidDelivery("recipient is required"));
        }
        if phone.trim().is_empty() {
            return Err(ValidationError::InvalidDelivery("phone is required"));
        }
        if address.trim().is_empty() {
            return Err(ValidationError::InvalidDelivery("address is required"));
        }
        if city.trim().is_empty() {
            return Err(ValidationError::InvalidDelivery("city is required"));
        }
        Ok(())
    }
}

/// Who to contact about the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactDetails {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidContact("name is required"));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(ValidationError::InvalidContact("email is not valid")),
        }
    }
}
