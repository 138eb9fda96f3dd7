//! Customer notifications driven by the committed event log.
//!
//! State transitions never send anything themselves. [`NotificationRelay`]
//! is a projection: it reads committed order events in order and hands the
//! ones customers care about to a [`Notifier`]. Delivery is best effort
//! with bounded retries; a failed delivery is logged and counted, and never
//! affects committed state.

pub mod error;
pub mod notification;
pub mod notifier;
pub mod relay;

pub use error::NotificationDeliveryError;
pub use notification::{Notification, NotificationKind};
pub use notifier::{InMemoryNotifier, LogNotifier, Notifier};
pub use relay::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF, NotificationRelay};
