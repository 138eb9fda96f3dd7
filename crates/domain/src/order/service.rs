//! Order service: checkout, staff status changes and order lookups.

use common::AggregateId;
use event_store::{Catalog, EventEnvelope, EventStore};

use crate::command::{CommandHandler, CommandResult};
use crate::error::{DomainError, ValidationError};

use super::value_objects::merge_cart;
use super::{AdvanceStatus, Order, OrderLine, PlaceOrder, PricingPolicy};

/// Actor recorded on events written on behalf of the (anonymous) customer.
pub const CUSTOMER_ACTOR: &str = "customer";

/// Service for managing orders.
///
/// Prices every checkout from the catalog; client-supplied prices do not
/// exist in the API.
pub struct OrderService<S: EventStore + Catalog> {
    handler: CommandHandler<S, Order>,
    pricing: PricingPolicy,
}

impl<S: EventStore + Catalog> OrderService<S> {
    pub fn new(store: S, pricing: PricingPolicy) -> Self {
        Self {
            handler: CommandHandler::new(store),
            pricing,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    pub fn store(&self) -> &S {
        self.handler.store()
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Places an order from a cart.
    ///
    /// Every product must exist and have enough stock right now. Stock is
    /// not reserved; it is decremented when the payment is confirmed.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        if cmd.items.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        if let Some(item) = cmd.items.iter().find(|item| item.quantity == 0) {
            return Err(ValidationError::InvalidQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            }
            .into());
        }
        cmd.contact.validate()?;
        cmd.delivery.validate()?;

        let items = merge_cart(&cmd.items);
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self
                .store()
                .get_product(&item.product_id)
                .await?
                .ok_or_else(|| ValidationError::UnknownProduct(item.product_id.clone()))?;

            if product.stock < item.quantity {
                return Err(ValidationError::OutOfStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.stock,
                }
                .into());
            }
            lines.push(OrderLine::new(
                product.id,
                product.name,
                item.quantity,
                product.unit_price,
            ));
        }

        let totals = self.pricing.totals(&lines, &cmd.delivery)?;
        let PlaceOrder {
            order_id,
            delivery,
            contact,
            notes,
            ..
        } = cmd;

        let result = self
            .handler
            .execute(order_id, CUSTOMER_ACTOR, |order| {
                order.place(order_id, contact, lines, totals, delivery, notes)
            })
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(total = %totals.total, "order placed");
        Ok(result)
    }

    /// Moves an order to a new status on behalf of a staff member.
    #[tracing::instrument(skip(self))]
    pub async fn advance_status(
        &self,
        cmd: AdvanceStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        let AdvanceStatus {
            order_id,
            status,
            changed_by,
            reason,
        } = cmd;
        let actor = changed_by.to_string();

        let result = self
            .handler
            .execute(order_id, &actor, |order| {
                order.advance_status(status, changed_by, reason)
            })
            .await?;

        metrics::counter!("order_status_changes_total", "to" => status.as_str()).increment(1);
        tracing::info!(%order_id, %status, "order status changed");
        Ok(result)
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// The raw event history of an order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn order_events(
        &self,
        order_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        Ok(self.store().get_events_for_aggregate(order_id).await?)
    }
}
