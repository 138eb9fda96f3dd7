//! Domain layer for the storefront order system.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler, which turns aggregate decisions into atomic store commits
//! - the Order aggregate with its status state machine and pricing
//! - the payment verification engine: claims, the payment state machine
//!   and `PaymentVerifier`

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod payment;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use common::{AggregateId, Money, ProductId, StaffId};
pub use error::{DomainError, OrderError, ValidationError};
pub use order::{
    AdvanceStatus, CartItem, ContactDetails, Delivery, Order, OrderEvent, OrderLine, OrderService,
    OrderStatus, OrderTotals, PlaceOrder, PricingPolicy, StatusTrigger,
};
pub use payment::{
    AuditOutcome, PaymentAuditEntry, PaymentClaim, PaymentRecord, PaymentStatus, PaymentVerifier,
    SubmitPayment, VerificationOutcome, VerifyAction, VerifyPayment,
};
