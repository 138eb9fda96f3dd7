//! Outbox relay: committed order events in, notifications out.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, Order, OrderEvent};
use event_store::EventEnvelope;
use projections::{Projection, ProjectionPosition, Result};
use tokio::sync::Mutex;

use crate::notification::{Notification, NotificationKind};
use crate::notifier::Notifier;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Default)]
struct RelayState {
    /// Orders rebuilt from the log, so each notification carries a full
    /// snapshot without going back to the store. Settled orders are evicted.
    orders: HashMap<AggregateId, Order>,
    position: ProjectionPosition,
}

/// Projection that turns committed order events into notifications.
///
/// Each triggering event is handed to the notifier once (plus retries).
/// After `max_attempts` failed tries the notification is dropped with a
/// warning; the relay's position moves on regardless, so one bad delivery
/// never stalls the ones behind it.
pub struct NotificationRelay<N: Notifier> {
    notifier: Arc<N>,
    state: Arc<Mutex<RelayState>>,
    delivering: Arc<AtomicBool>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl<N: Notifier> Clone for NotificationRelay<N> {
    fn clone(&self) -> Self {
        Self {
            notifier: Arc::clone(&self.notifier),
            state: Arc::clone(&self.state),
            delivering: Arc::clone(&self.delivering),
            max_attempts: self.max_attempts,
            retry_backoff: self.retry_backoff,
        }
    }
}

impl<N: Notifier> NotificationRelay<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier: Arc::new(notifier),
            state: Arc::new(Mutex::new(RelayState::default())),
            delivering: Arc::new(AtomicBool::new(true)),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Turns delivery on or off. While off, events still update the relay's
    /// snapshots and position but nothing is sent. Used to skip history that
    /// was already announced before a restart.
    pub fn set_delivering(&self, delivering: bool) {
        self.delivering.store(delivering, Ordering::SeqCst);
    }

    /// Number of orders whose snapshot the relay is still holding.
    pub async fn tracked_orders(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    async fn deliver(&self, notification: Notification) {
        let kind = notification.kind.as_str();
        let order_id = notification.order_id();

        for attempt in 1..=self.max_attempts {
            match self.notifier.notify(&notification).await {
                Ok(()) => {
                    metrics::counter!("notifications_delivered_total", "kind" => kind)
                        .increment(1);
                    tracing::debug!(kind, ?order_id, attempt, "notification delivered");
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::debug!(kind, ?order_id, attempt, error = %e, "notification failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => {
                    metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
                    tracing::warn!(
                        kind,
                        ?order_id,
                        attempts = attempt,
                        error = %e,
                        "notification dropped after final attempt"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl<N: Notifier + 'static> Projection for NotificationRelay<N> {
    fn name(&self) -> &'static str {
        "NotificationRelay"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let notification = {
            let mut state = self.state.lock().await;
            state.position = state.position.advance();

            if event.aggregate_type != Order::aggregate_type() {
                return Ok(());
            }

            let order_event: OrderEvent = event.decode()?;
            let kind = NotificationKind::for_event(&order_event);

            let order = state.orders.entry(event.aggregate_id).or_default();
            order.apply(order_event);
            order.set_version(event.version);

            let notification = match kind {
                Some(kind) if self.delivering.load(Ordering::SeqCst) => {
                    Some(Notification::new(kind, order.clone()))
                }
                _ => None,
            };

            // No later event can touch a settled order.
            if order.is_settled() {
                state.orders.remove(&event.aggregate_id);
            }
            notification
        };

        if let Some(notification) = notification {
            self.deliver(notification).await;
        }
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.lock().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.lock().await = RelayState::default();
        Ok(())
    }
}
