//! Integration tests for checkout and payment verification.
//!
//! These tests drive the services against the in-memory store and check
//! what ends up persisted: events, stock levels and rebuilt aggregates.

use std::sync::Arc;

use common::{AggregateId, StaffId};
use domain::{
    Aggregate, AuditOutcome, CartItem, ContactDetails, Delivery, DomainError, Money, OrderError,
    OrderEvent, OrderService, OrderStatus, PaymentStatus, PaymentVerifier, PlaceOrder,
    PricingPolicy, StatusTrigger, SubmitPayment, ValidationError, VerifyPayment,
};
use event_store::{Catalog, EventStore, InMemoryEventStore, Product};

struct Shop {
    store: InMemoryEventStore,
    orders: OrderService<InMemoryEventStore>,
    payments: PaymentVerifier<InMemoryEventStore>,
}

impl Shop {
    async fn with_stock(stock: u32) -> Self {
        let store = InMemoryEventStore::new();
        store
            .upsert_product(Product::new(
                "kikoy",
                "Kikoy towel",
                Money::from_shillings(500),
                stock,
            ))
            .await
            .unwrap();
        Self {
            orders: OrderService::new(store.clone(), PricingPolicy::default()),
            payments: PaymentVerifier::new(store.clone()),
            store,
        }
    }

    async fn place(&self, quantity: u32, delivery: Delivery) -> (AggregateId, Money) {
        let order = self
            .orders
            .place_order(PlaceOrder::new(
                vec![CartItem::new("kikoy", quantity)],
                delivery,
                ContactDetails::new("Baraka", "baraka@example.co.ke"),
            ))
            .await
            .unwrap()
            .aggregate;
        (order.id().unwrap(), order.total())
    }

    async fn submit(&self, order_id: AggregateId, amount: Money, code: &str) -> Result<(), DomainError> {
        self.payments
            .submit_payment(SubmitPayment {
                order_id,
                amount,
                phone: "+254 712 345 678".into(),
                transaction_code: code.into(),
            })
            .await
            .map(|_| ())
    }

    async fn stock(&self) -> u32 {
        self.store
            .get_product(&"kikoy".into())
            .await
            .unwrap()
            .unwrap()
            .stock
    }
}

fn staff() -> StaffId {
    StaffId::parse("wanjiru").unwrap()
}

fn address() -> Delivery {
    Delivery::Address {
        recipient: "Achieng".into(),
        phone: "0712345678".into(),
        address: "Moi Avenue 12".into(),
        city: "Mombasa".into(),
    }
}

mod payment_verification {
    use super::*;

    #[tokio::test]
    async fn claimed_amount_must_match_server_total() {
        let shop = Shop::with_stock(10).await;
        let (order_id, total) = shop.place(2, address()).await;
        assert_eq!(total, Money::from_shillings(1300));

        let err = shop
            .submit(order_id, Money::from_shillings(1200), "QGH7XK2L9P")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::Validation(ValidationError::AmountMismatch { .. }))
        ));

        shop.submit(order_id, Money::from_shillings(1300), "QGH7XK2L9P")
            .await
            .unwrap();
        let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Awaiting);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn last_unit_goes_to_first_confirmed_order() {
        let shop = Shop::with_stock(1).await;
        let (first, first_total) = shop.place(1, Delivery::Pickup).await;
        let (second, second_total) = shop.place(1, Delivery::Pickup).await;
        shop.submit(first, first_total, "QAA1111111").await.unwrap();
        shop.submit(second, second_total, "QBB2222222").await.unwrap();

        let confirmed = shop
            .payments
            .verify_payment(VerifyPayment::confirm(first, staff()))
            .await
            .unwrap();
        assert_eq!(confirmed.order.status(), OrderStatus::Processing);
        assert_eq!(shop.stock().await, 0);

        let err = shop
            .payments
            .verify_payment(VerifyPayment::confirm(second, staff()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InsufficientStock {
                requested: 1,
                available: 0,
                ..
            })
        ));

        let second = shop.orders.get_order(second).await.unwrap().unwrap();
        assert_eq!(second.payment_status(), PaymentStatus::Awaiting);
        assert_eq!(second.status(), OrderStatus::Pending);
        assert_eq!(shop.stock().await, 0);
    }

    #[tokio::test]
    async fn restock_lets_verification_succeed_again() {
        let shop = Shop::with_stock(1).await;
        let (order_id, total) = shop.place(1, Delivery::Pickup).await;
        shop.submit(order_id, total, "QAA1111111").await.unwrap();
        shop.store.decrement_stock(&"kikoy".into(), 1).await.unwrap();

        assert!(
            shop.payments
                .verify_payment(VerifyPayment::confirm(order_id, staff()))
                .await
                .is_err()
        );

        shop.store.restock(&"kikoy".into(), 3).await.unwrap();
        let outcome = shop
            .payments
            .verify_payment(VerifyPayment::confirm(order_id, staff()))
            .await
            .unwrap();
        assert_eq!(outcome.order.payment_status(), PaymentStatus::Confirmed);
        assert_eq!(shop.stock().await, 2);
    }

    #[tokio::test]
    async fn rejected_claim_can_be_resubmitted_and_confirmed() {
        let shop = Shop::with_stock(10).await;
        let (order_id, total) = shop.place(2, address()).await;
        shop.submit(order_id, total, "QAA1111111").await.unwrap();

        let rejected = shop
            .payments
            .verify_payment(VerifyPayment::reject(order_id, staff(), "wrong code"))
            .await
            .unwrap();
        assert_eq!(rejected.order.status(), OrderStatus::Pending);
        assert_eq!(rejected.order.payment_status(), PaymentStatus::Rejected);

        shop.submit(order_id, total, "qbb2222222").await.unwrap();
        let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Awaiting);

        let confirmed = shop
            .payments
            .verify_payment(VerifyPayment::confirm(order_id, staff()))
            .await
            .unwrap();
        let payment = confirmed.order.payment().unwrap();
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert_eq!(payment.transaction_code, "QBB2222222");
        assert_eq!(payment.submission_count, 2);
        assert_eq!(confirmed.order.status(), OrderStatus::Processing);
        assert_eq!(shop.stock().await, 8);
    }

    #[tokio::test]
    async fn awaiting_claim_cannot_be_replaced() {
        let shop = Shop::with_stock(10).await;
        let (order_id, total) = shop.place(1, Delivery::Pickup).await;
        shop.submit(order_id, total, "QAA1111111").await.unwrap();

        let err = shop.submit(order_id, total, "QBB2222222").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_order_refuses_payment() {
        let shop = Shop::with_stock(10).await;
        let (order_id, total) = shop.place(1, Delivery::Pickup).await;
        shop.orders
            .advance_status(domain::AdvanceStatus::new(
                order_id,
                OrderStatus::Cancelled,
                staff(),
            ))
            .await
            .unwrap();

        let err = shop.submit(order_id, total, "QAA1111111").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition { .. })
        ));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn concurrent_confirms_decrement_stock_once() {
        let shop = Shop::with_stock(5).await;
        let (order_id, total) = shop.place(2, Delivery::Pickup).await;
        shop.submit(order_id, total, "QGH7XK2L9P").await.unwrap();

        let verifier = Arc::new(PaymentVerifier::new(shop.store.clone()));
        let tasks: Vec<_> = ["wanjiru", "otieno"]
            .into_iter()
            .map(|name| {
                let verifier = Arc::clone(&verifier);
                let staff = StaffId::parse(name).unwrap();
                tokio::spawn(async move {
                    verifier
                        .verify_payment(VerifyPayment::confirm(order_id, staff))
                        .await
                })
            })
            .collect();

        let mut fresh_confirmations = 0;
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            if !outcome.already_confirmed {
                fresh_confirmations += 1;
            }
            assert_eq!(outcome.order.payment_status(), PaymentStatus::Confirmed);
        }

        assert_eq!(fresh_confirmations, 1);
        assert_eq!(shop.stock().await, 3);

        let confirmations = shop
            .orders
            .order_events(order_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == "PaymentConfirmed")
            .count();
        assert_eq!(confirmations, 1);
    }

    #[tokio::test]
    async fn stale_decision_never_lands() {
        let shop = Shop::with_stock(5).await;
        let (order_id, total) = shop.place(1, Delivery::Pickup).await;
        shop.submit(order_id, total, "QGH7XK2L9P").await.unwrap();

        let stale = shop.payments.handler().load(order_id).await.unwrap();
        shop.payments
            .verify_payment(VerifyPayment::reject(order_id, staff(), "not received"))
            .await
            .unwrap();

        // A confirmation decided on the stale copy must not be committed.
        let events = stale.confirm_payment(staff()).unwrap();
        assert_eq!(events.len(), 2);
        let current = shop.orders.get_order(order_id).await.unwrap().unwrap();
        assert!(current.confirm_payment(staff()).is_err());
        assert_ne!(stale.version(), current.version());
        assert_eq!(
            shop.store.get_aggregate_version(order_id).await.unwrap(),
            Some(current.version())
        );
    }
}

mod event_history {
    use super::*;

    #[tokio::test]
    async fn rebuilt_order_carries_full_audit_trail() {
        let shop = Shop::with_stock(10).await;
        let (order_id, total) = shop.place(1, Delivery::Pickup).await;

        shop.submit(order_id, total, "QAA1111111").await.unwrap();
        shop.payments
            .verify_payment(VerifyPayment::reject(order_id, staff(), "wrong code"))
            .await
            .unwrap();
        shop.submit(order_id, total, "QBB2222222").await.unwrap();
        shop.payments
            .verify_payment(VerifyPayment::confirm(order_id, staff()))
            .await
            .unwrap();

        let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
        let trail = &order.payment().unwrap().audit_trail;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].outcome, AuditOutcome::Rejected);
        assert_eq!(trail[0].reason.as_deref(), Some("wrong code"));
        assert_eq!(trail[0].transaction_code, "QAA1111111");
        assert_eq!(trail[1].outcome, AuditOutcome::Confirmed);
        assert_eq!(trail[1].transaction_code, "QBB2222222");

        let envelopes = shop.orders.order_events(order_id).await.unwrap();
        let types: Vec<_> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            [
                "OrderPlaced",
                "PaymentSubmitted",
                "PaymentRejected",
                "PaymentSubmitted",
                "PaymentConfirmed",
                "OrderStatusChanged",
            ]
        );
        assert_eq!(envelopes[0].actor(), Some("customer"));
        assert_eq!(envelopes[4].actor(), Some("wanjiru"));

        let status_change: OrderEvent = envelopes[5].decode().unwrap();
        match status_change {
            OrderEvent::OrderStatusChanged(data) => {
                assert_eq!(data.from, OrderStatus::Pending);
                assert_eq!(data.to, OrderStatus::Processing);
                assert_eq!(data.trigger, StatusTrigger::Payment);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn fulfillment_runs_to_delivery_after_confirmation() {
        let shop = Shop::with_stock(10).await;
        let (order_id, total) = shop.place(1, address()).await;
        shop.submit(order_id, total, "QAA1111111").await.unwrap();
        shop.payments
            .verify_payment(VerifyPayment::confirm(order_id, staff()))
            .await
            .unwrap();

        let result = shop
            .orders
            .advance_status(domain::AdvanceStatus::new(
                order_id,
                OrderStatus::Delivered,
                staff(),
            ))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Delivered);
        assert!(result.aggregate.status().is_terminal());

        let err = shop
            .orders
            .advance_status(domain::AdvanceStatus::new(
                order_id,
                OrderStatus::Cancelled,
                staff(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidTransition { .. })
        ));
    }
}
