//! Domain error types.

use common::{Money, ProductId};
use event_store::{EnvelopeError, EventStoreError};
use thiserror::Error;

/// Malformed or logically inconsistent input. The caller can always fix it
/// by correcting the request; it is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity {quantity} for {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("Product {0} does not exist")]
    UnknownProduct(ProductId),

    #[error("Only {available} of {product_id} in stock, {requested} requested")]
    OutOfStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Order total must be positive, computed {0}")]
    NonPositiveTotal(Money),

    #[error("Order amount exceeds the supported range")]
    AmountOverflow,

    #[error("Claimed amount {claimed} does not match order total {expected}")]
    AmountMismatch { expected: Money, claimed: Money },

    #[error("Invalid M-Pesa phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid M-Pesa transaction code: {0}")]
    InvalidTransactionCode(String),

    #[error("A rejection reason is required")]
    MissingRejectionReason,

    #[error("Invalid delivery details: {0}")]
    InvalidDelivery(&'static str),

    #[error("Invalid contact details: {0}")]
    InvalidContact(&'static str),
}

/// Errors raised by the Order aggregate and the payment verification engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The requested state change is not legal from the current state.
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    /// Stock fell below the ordered quantity between checkout and
    /// confirmation. Needs a staff decision (restock or refund).
    #[error(
        "Insufficient stock for {product_id}: {requested} ordered, {available} available. \
         Restock the product or refund the customer, then verify again"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order not found")]
    NotFound,

    #[error("No payment has been submitted for this order")]
    PaymentNotSubmitted,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ValidationError> for DomainError {
    fn from(e: ValidationError) -> Self {
        DomainError::Order(OrderError::Validation(e))
    }
}

impl DomainError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_concurrency_conflict())
    }
}
