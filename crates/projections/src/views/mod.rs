//! Read model views for the query side.

pub mod payment_queue;

pub use payment_queue::{PaymentQueueView, PendingPayment};
