//! Read models and projections for the query side.
//!
//! - [`Projection`] trait for consuming the committed event log
//! - [`ReadModel`] trait for query access to derived data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - [`PaymentQueueView`], the staff verification queue

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{PaymentQueueView, PendingPayment};
