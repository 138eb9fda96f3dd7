//! Notification error types.

use thiserror::Error;

/// A notifier could not deliver a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationDeliveryError {
    /// The provider could not be reached or timed out. Worth retrying.
    #[error("Notification provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the message.
    #[error("Notification to {recipient} rejected: {reason}")]
    Rejected { recipient: String, reason: String },
}
