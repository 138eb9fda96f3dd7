//! Notifier trait and the built-in implementations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::NotificationDeliveryError;
use crate::notification::Notification;

/// Delivers notifications to customers (email, SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationDeliveryError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationDeliveryError> {
        (**self).notify(notification).await
    }
}

/// Writes notifications to the log instead of sending them. Used when no
/// provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationDeliveryError> {
        tracing::info!(
            kind = %notification.kind,
            order_id = ?notification.order_id(),
            to = notification.recipient(),
            status = %notification.order.status(),
            payment = %notification.order.payment_status(),
            "notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    attempts: u32,
    failures_left: u32,
    fail_always: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` deliveries fail.
    pub fn fail_next(&self, count: u32) {
        self.state().failures_left = count;
    }

    /// Makes every delivery fail until switched off again.
    pub fn set_fail_always(&self, fail: bool) {
        self.state().fail_always = fail;
    }

    /// Notifications delivered so far, in delivery order.
    pub fn sent(&self) -> Vec<Notification> {
        self.state().sent.clone()
    }

    /// Delivery attempts so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.state().attempts
    }

    fn state(&self) -> MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationDeliveryError> {
        let mut state = self.state();
        state.attempts += 1;

        if state.fail_always {
            return Err(NotificationDeliveryError::Unavailable(
                "provider down".to_string(),
            ));
        }
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(NotificationDeliveryError::Unavailable(
                "provider timed out".to_string(),
            ));
        }

        state.sent.push(notification.clone());
        Ok(())
    }
}
