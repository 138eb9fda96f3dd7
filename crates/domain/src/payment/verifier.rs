use std::time::Instant;

use common::{AggregateId, Money, StaffId};
use event_store::{EventStore, EventStoreError};

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::{DomainError, OrderError};
use crate::order::{CUSTOMER_ACTOR, Order, OrderEvent};

use super::PaymentClaim;

/// How many times a verification is attempted when another writer keeps
/// winning the race for the order stream.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A customer submits (or resubmits) an M-Pesa payment claim.
#[derive(Debug, Clone)]
pub struct SubmitPayment {
    pub order_id: AggregateId,
    pub amount: Money,
    pub phone: String,
    pub transaction_code: String,
}

impl Command for SubmitPayment {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyAction {
    Confirm,
    Reject { reason: String },
}

/// A staff member's verdict on the claim under review.
#[derive(Debug, Clone)]
pub struct VerifyPayment {
    pub order_id: AggregateId,
    pub action: VerifyAction,
    pub staff: StaffId,
}

impl VerifyPayment {
    pub fn confirm(order_id: AggregateId, staff: StaffId) -> Self {
        Self {
            order_id,
            action: VerifyAction::Confirm,
            staff,
        }
    }

    pub fn reject(order_id: AggregateId, staff: StaffId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            action: VerifyAction::Reject {
                reason: reason.into(),
            },
            staff,
        }
    }
}

impl Command for VerifyPayment {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub order: Order,

    /// The payment was confirmed before this call; nothing was written.
    pub already_confirmed: bool,

    pub events: Vec<OrderEvent>,
}

/// Moves payment claims through submission and staff verification.
///
/// Confirmation appends the payment and status events and decrements stock
/// for every line in one commit. A writer that loses the version race
/// reloads the order and decides again, so a second confirmation observes
/// the first and becomes a no-op.
pub struct PaymentVerifier<S: EventStore> {
    handler: CommandHandler<S, Order>,
    max_attempts: u32,
}

impl<S: EventStore> PaymentVerifier<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Records a customer's payment claim against a pending order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn submit_payment(
        &self,
        cmd: SubmitPayment,
    ) -> Result<CommandResult<Order>, DomainError> {
        let claim = PaymentClaim::parse(cmd.amount, &cmd.phone, &cmd.transaction_code)?;

        let mut attempt = 1;
        let result = loop {
            let outcome = self
                .handler
                .execute(cmd.order_id, CUSTOMER_ACTOR, |order| {
                    order.submit_payment(claim.clone())
                })
                .await;
            match outcome {
                Err(e) if e.is_concurrency_conflict() && attempt < self.max_attempts => {
                    tracing::debug!(attempt, "order changed underneath submission, retrying");
                    attempt += 1;
                }
                other => break other?,
            }
        };

        metrics::counter!("payments_submitted_total").increment(1);
        tracing::info!(
            transaction_code = %claim.transaction_code,
            amount = %claim.amount,
            "payment submitted for verification"
        );
        Ok(result)
    }

    /// Applies a staff verdict to the payment under review.
    ///
    /// Confirming an already confirmed payment succeeds without writing
    /// anything and reports `already_confirmed`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, staff = %cmd.staff))]
    pub async fn verify_payment(
        &self,
        cmd: VerifyPayment,
    ) -> Result<VerificationOutcome, DomainError> {
        let started = Instant::now();
        let actor = cmd.staff.to_string();

        let mut attempt = 1;
        let result = loop {
            let outcome = match &cmd.action {
                VerifyAction::Confirm => {
                    self.handler
                        .execute_with_stock(cmd.order_id, &actor, |order| {
                            let events = order.confirm_payment(cmd.staff.clone())?;
                            let decrements = if events.is_empty() {
                                Vec::new()
                            } else {
                                order.stock_decrements()
                            };
                            Ok((events, decrements))
                        })
                        .await
                }
                VerifyAction::Reject { reason } => {
                    self.handler
                        .execute(cmd.order_id, &actor, |order| {
                            order.reject_payment(cmd.staff.clone(), reason)
                        })
                        .await
                }
            };

            match outcome {
                Err(e) if e.is_concurrency_conflict() && attempt < self.max_attempts => {
                    metrics::counter!("payment_verification_conflicts_total").increment(1);
                    tracing::debug!(attempt, "concurrent verification, reloading order");
                    attempt += 1;
                }
                other => break other,
            }
        };

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                let e = self.stock_shortfall(cmd.order_id, e).await;
                tracing::warn!(error = %e, "payment verification failed");
                return Err(e);
            }
        };

        let already_confirmed = cmd.action == VerifyAction::Confirm && result.events.is_empty();
        let outcome_label = match (&cmd.action, already_confirmed) {
            (VerifyAction::Confirm, true) => "already_confirmed",
            (VerifyAction::Confirm, false) => "confirmed",
            (VerifyAction::Reject { .. }, _) => "rejected",
        };
        metrics::counter!("payments_verified_total", "outcome" => outcome_label).increment(1);
        metrics::histogram!("payment_verification_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(outcome = outcome_label, "payment verified");

        Ok(VerificationOutcome {
            order: result.aggregate,
            already_confirmed,
            events: result.events,
        })
    }

    /// Turns a refused stock decrement into the error staff act on. The
    /// whole commit was refused, so nothing changed.
    async fn stock_shortfall(&self, order_id: AggregateId, err: DomainError) -> DomainError {
        match err {
            DomainError::EventStore(EventStoreError::InsufficientStock {
                product_id,
                requested,
                available,
            }) => OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            }
            .into(),
            DomainError::EventStore(EventStoreError::ProductNotFound(product_id)) => {
                let requested = match self.handler.load(order_id).await {
                    Ok(order) => order.quantity_of(&product_id).unwrap_or(0),
                    Err(_) => 0,
                };
                OrderError::InsufficientStock {
                    product_id,
                    requested,
                    available: 0,
                }
                .into()
            }
            other => other,
        }
    }
}
