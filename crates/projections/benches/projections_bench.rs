use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, CartItem, ContactDetails, Delivery, Money, OrderService, PaymentVerifier,
    PlaceOrder, PricingPolicy, SubmitPayment,
};
use event_store::{Catalog, InMemoryEventStore, Product};
use projections::{PaymentQueueView, ProjectionProcessor};

/// Populates a store with `n` orders, each placed and with a submitted claim.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    store
        .upsert_product(Product::new(
            "kikoy",
            "Kikoy towel",
            Money::from_shillings(500),
            u32::MAX,
        ))
        .await
        .unwrap();
    let orders = OrderService::new(store.clone(), PricingPolicy::default());
    let payments = PaymentVerifier::new(store.clone());

    for _ in 0..n {
        let order = orders
            .place_order(PlaceOrder::new(
                vec![CartItem::new("kikoy", 2)],
                Delivery::Pickup,
                ContactDetails::new("Baraka", "baraka@example.co.ke"),
            ))
            .await
            .unwrap()
            .aggregate;
        payments
            .submit_payment(SubmitPayment {
                order_id: order.id().unwrap(),
                amount: order.total(),
                phone: "0712345678".into(),
                transaction_code: "QGH7XK2L9P".into(),
            })
            .await
            .unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion, orders: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, orders));

    c.bench_function(&format!("projections/payment_queue_{}_events", orders * 2), |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut processor = ProjectionProcessor::new(store.clone());
                processor.register(Box::new(PaymentQueueView::new()));
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_catch_up_100_orders(c: &mut Criterion) {
    bench_catch_up(c, 100);
}

fn bench_catch_up_1000_orders(c: &mut Criterion) {
    bench_catch_up(c, 1000);
}

criterion_group!(benches, bench_catch_up_100_orders, bench_catch_up_1000_orders);
criterion_main!(benches);
