//! Shared application state.

use std::collections::HashSet;
use std::sync::Arc;

use common::StaffId;
use domain::{OrderService, PaymentVerifier, PricingPolicy};
use event_store::{Catalog, EventStore};
use notifications::{NotificationRelay, Notifier};
use projections::{PaymentQueueView, ProjectionProcessor};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore + Catalog> {
    pub orders: OrderService<S>,
    pub payments: PaymentVerifier<S>,
    pub store: S,
    pub payment_queue: PaymentQueueView,
    /// Feeds the verification queue; caught up on read.
    pub queue_processor: Arc<ProjectionProcessor<S>>,
    /// Feeds the notification relay; driven by the outbox worker only.
    pub outbox: Arc<ProjectionProcessor<S>>,
    /// Wakes the outbox worker. One slot: a full channel already holds a
    /// pending wakeup.
    pub outbox_signal: mpsc::Sender<()>,
    /// `None` accepts any staff id.
    pub staff_ids: Option<HashSet<StaffId>>,
}

impl<S: EventStore + Catalog> AppState<S> {
    /// Tells the outbox worker there are new commits to relay.
    pub fn wake_outbox(&self) {
        match self.outbox_signal.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => {
                tracing::debug!("outbox worker not running, commit left for the next start");
            }
        }
    }

    pub fn is_staff(&self, staff: &StaffId) -> bool {
        self.staff_ids
            .as_ref()
            .is_none_or(|allowed| allowed.contains(staff))
    }
}

/// The relay side of the outbox, handed to whoever runs the worker.
pub struct OutboxParts<N: Notifier> {
    /// Kept so the caller can mute it while priming the outbox with history
    /// that was already announced.
    pub relay: NotificationRelay<N>,
    pub wakeups: mpsc::Receiver<()>,
}

/// Wires services, read models and the notification relay around one store.
pub fn create_default_state<S, N>(
    store: S,
    config: &Config,
    notifier: N,
) -> (Arc<AppState<S>>, OutboxParts<N>)
where
    S: EventStore + Catalog + Clone + 'static,
    N: Notifier + 'static,
{
    let pricing = PricingPolicy::new(config.delivery_fee, config.free_delivery_threshold);

    let payment_queue = PaymentQueueView::new();
    let mut queue_processor = ProjectionProcessor::new(store.clone());
    queue_processor.register(Box::new(payment_queue.clone()));

    let relay = NotificationRelay::new(notifier)
        .with_retry(config.notify_max_attempts, config.notify_retry_backoff);
    let mut outbox = ProjectionProcessor::new(store.clone());
    outbox.register(Box::new(relay.clone()));
    let (outbox_signal, wakeups) = mpsc::channel(1);

    let state = Arc::new(AppState {
        orders: OrderService::new(store.clone(), pricing),
        payments: PaymentVerifier::new(store.clone()),
        store,
        payment_queue,
        queue_processor: Arc::new(queue_processor),
        outbox: Arc::new(outbox),
        outbox_signal,
        staff_ids: config.staff_ids.clone(),
    });

    (state, OutboxParts { relay, wakeups })
}
