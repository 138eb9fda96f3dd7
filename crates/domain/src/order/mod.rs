//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod pricing;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::{AdvanceStatus, PlaceOrder};
pub use events::{
    OrderEvent, OrderPlacedData, OrderStatusChangedData, PaymentConfirmedData,
    PaymentRejectedData, PaymentSubmittedData, StatusTrigger,
};
pub use pricing::PricingPolicy;
pub use service::{CUSTOMER_ACTOR, OrderService};
pub use state::OrderStatus;
pub use value_objects::{CartItem, ContactDetails, Delivery, OrderLine, OrderTotals};
