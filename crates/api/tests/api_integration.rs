//! Integration tests for the API server.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, StaffId};
use event_store::{Catalog, InMemoryEventStore, Product};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{InMemoryNotifier, NotificationKind};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const STAFF: &str = "wanjiru";

struct TestApp {
    app: axum::Router,
    state: Arc<api::AppState<InMemoryEventStore>>,
    outbox: api::OutboxParts<InMemoryNotifier>,
    notifier: InMemoryNotifier,
}

async fn setup() -> TestApp {
    let store = InMemoryEventStore::new();
    store
        .upsert_product(Product::new(
            "kikoy",
            "Kikoy towel",
            Money::from_shillings(500),
            5,
        ))
        .await
        .unwrap();

    let config = api::config::Config {
        staff_ids: Some(HashSet::from([StaffId::parse(STAFF).unwrap()])),
        notify_retry_backoff: std::time::Duration::ZERO,
        ..api::config::Config::default()
    };
    let notifier = InMemoryNotifier::new();
    let (state, outbox) = api::create_default_state(store, &config, notifier.clone());
    let app = api::create_app(state.clone(), get_metrics_handle());

    TestApp {
        app,
        state,
        outbox,
        notifier,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        staff: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(staff) = staff {
            request = request.header("x-staff-id", staff);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn place(&self, quantity: u32) -> Value {
        let (status, order) = self
            .send(
                "POST",
                "/orders",
                None,
                Some(json!({
                    "items": [{"product_id": "kikoy", "quantity": quantity}],
                    "delivery": {"method": "pickup"},
                    "contact": {"name": "Baraka", "email": "baraka@example.co.ke"}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        order
    }

    async fn submit(&self, order: &Value, code: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/payments",
            None,
            Some(json!({
                "order_id": order["id"],
                "amount_cents": order["total_cents"],
                "phone_number": "0712 345 678",
                "transaction_code": code
            })),
        )
        .await
    }

    async fn verify(&self, order: &Value, body: Value) -> (StatusCode, Value) {
        let uri = format!("/payments/verify/{}", order["id"].as_str().unwrap());
        self.send("PUT", &uri, Some(STAFF), Some(body)).await
    }

    async fn stock(&self) -> u64 {
        let (status, product) = self.send("GET", "/products/kikoy", None, None).await;
        assert_eq!(status, StatusCode::OK);
        product["stock"].as_u64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;
    let (status, body) = t.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn test_place_pickup_order() {
        let t = setup().await;
        let order = t.place(2).await;

        assert_eq!(order["status"], "pending");
        assert_eq!(order["subtotal_cents"], 100_000);
        assert_eq!(order["shipping_cents"], 0);
        assert_eq!(order["total_cents"], 100_000);
        assert_eq!(order["lines"][0]["product_name"], "Kikoy towel");
        assert!(order["payment"].is_null());
    }

    #[tokio::test]
    async fn test_address_delivery_adds_fee() {
        let t = setup().await;
        let (status, order) = t
            .send(
                "POST",
                "/orders",
                None,
                Some(json!({
                    "items": [{"product_id": "kikoy", "quantity": 1}],
                    "delivery": {
                        "method": "address",
                        "recipient": "Achieng",
                        "phone": "0712345678",
                        "address": "Moi Avenue 12",
                        "city": "Mombasa"
                    },
                    "contact": {"name": "Baraka", "email": "baraka@example.co.ke"},
                    "notes": "Call on arrival"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["shipping_cents"], 30_000);
        assert_eq!(order["total_cents"], 80_000);
        assert_eq!(order["notes"], "Call on arrival");
    }

    #[tokio::test]
    async fn test_invalid_carts_are_rejected() {
        let t = setup().await;
        let contact = json!({"name": "Baraka", "email": "baraka@example.co.ke"});

        for items in [
            json!([]),
            json!([{"product_id": "kikoy", "quantity": 0}]),
            json!([{"product_id": "kanga", "quantity": 1}]),
            json!([{"product_id": "kikoy", "quantity": 6}]),
        ] {
            let (status, body) = t
                .send(
                    "POST",
                    "/orders",
                    None,
                    Some(json!({"items": items, "contact": contact})),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "items: {items}");
            assert_eq!(body["kind"], "validation_error");
        }
        assert_eq!(t.stock().await, 5);
    }

    #[tokio::test]
    async fn test_out_of_range_total_is_rejected() {
        let t = setup().await;
        let (status, _) = t
            .send(
                "PUT",
                "/products/gold",
                Some(STAFF),
                Some(json!({
                    "name": "Gold bar",
                    "unit_price_cents": i64::MAX / 2 + 1,
                    "stock": 5
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = t
            .send(
                "POST",
                "/orders",
                None,
                Some(json!({
                    "items": [{"product_id": "gold", "quantity": 2}],
                    "contact": {"name": "Baraka", "email": "baraka@example.co.ke"}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let t = setup().await;
        let (status, body) = t
            .send("POST", "/orders", None, Some(json!({"items": "kikoy"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_get_order() {
        let t = setup().await;
        let order = t.place(1).await;
        let uri = format!("/orders/{}", order["id"].as_str().unwrap());

        let (status, fetched) = t.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], order["id"]);
        assert_eq!(fetched["total_cents"], 50_000);
    }

    #[tokio::test]
    async fn test_get_unknown_order() {
        let t = setup().await;
        let (status, body) = t
            .send(
                "GET",
                "/orders/00000000-0000-0000-0000-000000000000",
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");

        let (status, _) = t.send("GET", "/orders/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn test_submit_and_confirm() {
        let t = setup().await;
        let order = t.place(2).await;

        let (status, payment) = t.submit(&order, "qgh7xk2l9p").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payment["status"], "awaiting");
        assert_eq!(payment["phone_number"], "254712345678");
        assert_eq!(payment["transaction_code"], "QGH7XK2L9P");

        let (status, queue) = t.send("GET", "/payments/pending", Some(STAFF), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(queue.as_array().unwrap().len(), 1);
        assert_eq!(queue[0]["order_id"], order["id"]);

        let (status, outcome) = t.verify(&order, json!({"action": "confirm"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["already_confirmed"], false);
        assert_eq!(outcome["payment"]["status"], "confirmed");
        assert_eq!(outcome["payment"]["verified_by"], STAFF);
        assert_eq!(outcome["order"]["status"], "processing");
        assert_eq!(t.stock().await, 3);

        let (status, queue) = t.send("GET", "/payments/pending", Some(STAFF), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(queue.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_confirm_is_idempotent() {
        let t = setup().await;
        let order = t.place(2).await;
        t.submit(&order, "QGH7XK2L9P").await;

        t.verify(&order, json!({"action": "confirm"})).await;
        let (status, outcome) = t.verify(&order, json!({"action": "confirm"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["already_confirmed"], true);
        assert_eq!(outcome["order"]["status"], "processing");
        assert_eq!(t.stock().await, 3);
    }

    #[tokio::test]
    async fn test_reject_then_resubmit() {
        let t = setup().await;
        let order = t.place(1).await;
        t.submit(&order, "QAA1111111").await;

        let (status, body) = t.verify(&order, json!({"action": "reject"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");

        let (status, outcome) = t
            .verify(
                &order,
                json!({"action": "reject", "rejection_reason": "code not found"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["payment"]["status"], "rejected");
        assert_eq!(outcome["payment"]["rejection_reason"], "code not found");
        assert_eq!(outcome["order"]["status"], "pending");
        assert_eq!(t.stock().await, 5);

        let (status, payment) = t.submit(&order, "QBB2222222").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payment["status"], "awaiting");
        assert_eq!(payment["submission_count"], 2);
        assert_eq!(payment["audit_trail"].as_array().unwrap().len(), 1);

        let (status, outcome) = t.verify(&order, json!({"action": "confirm"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["payment"]["audit_trail"].as_array().unwrap().len(), 2);
        assert_eq!(t.stock().await, 4);
    }

    #[tokio::test]
    async fn test_bad_claims() {
        let t = setup().await;
        let order = t.place(1).await;

        let (status, body) = t
            .send(
                "POST",
                "/payments",
                None,
                Some(json!({
                    "order_id": order["id"],
                    "amount_cents": 1,
                    "phone_number": "0712345678",
                    "transaction_code": "QAA1111111"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");

        let (status, _) = t
            .send(
                "POST",
                "/payments",
                None,
                Some(json!({
                    "order_id": order["id"],
                    "amount_cents": 50_000,
                    "phone_number": "12345",
                    "transaction_code": "QAA1111111"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = t
            .send(
                "POST",
                "/payments",
                None,
                Some(json!({
                    "order_id": "00000000-0000-0000-0000-000000000000",
                    "amount_cents": 50_000,
                    "phone_number": "0712345678",
                    "transaction_code": "QAA1111111"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_second_claim_while_awaiting_conflicts() {
        let t = setup().await;
        let order = t.place(1).await;
        t.submit(&order, "QAA1111111").await;

        let (status, body) = t.submit(&order, "QBB2222222").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "invalid_transition");
    }

    #[tokio::test]
    async fn test_verify_without_claim_is_not_found() {
        let t = setup().await;
        let order = t.place(1).await;

        let (status, body) = t.verify(&order, json!({"action": "confirm"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_stock_shortfall_needs_manual_resolution() {
        let t = setup().await;
        let order = t.place(2).await;
        t.submit(&order, "QAA1111111").await;

        let (status, _) = t
            .send(
                "PUT",
                "/products/kikoy",
                Some(STAFF),
                Some(json!({"name": "Kikoy towel", "unit_price_cents": 50_000, "stock": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = t.verify(&order, json!({"action": "confirm"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "insufficient_stock");
        assert_eq!(t.stock().await, 1);

        let uri = format!("/orders/{}", order["id"].as_str().unwrap());
        let (_, current) = t.send("GET", &uri, None, None).await;
        assert_eq!(current["status"], "pending");
        assert_eq!(current["payment"]["status"], "awaiting");
    }
}

mod staff {
    use super::*;

    #[tokio::test]
    async fn test_staff_routes_need_identity() {
        let t = setup().await;

        let (status, body) = t.send("GET", "/payments/pending", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthorized");

        let (status, body) = t
            .send("GET", "/payments/pending", Some("otieno"), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "forbidden");
    }

    #[tokio::test]
    async fn test_status_changes() {
        let t = setup().await;
        let order = t.place(1).await;
        let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

        let (status, body) = t
            .send("PUT", &uri, Some(STAFF), Some(json!({"status": "processing"})))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "invalid_transition");

        let (status, body) = t
            .send("PUT", &uri, Some(STAFF), Some(json!({"status": "shipped"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");

        let (status, cancelled) = t
            .send(
                "PUT",
                &uri,
                Some(STAFF),
                Some(json!({"status": "cancelled", "reason": "customer called"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");

        let (status, _) = t.submit(&order, "QAA1111111").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_event_history() {
        let t = setup().await;
        let order = t.place(1).await;
        t.submit(&order, "QAA1111111").await;
        t.verify(&order, json!({"action": "confirm"})).await;

        let uri = format!("/orders/{}/events", order["id"].as_str().unwrap());
        let (status, events) = t.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);

        let types: Vec<&str> = events
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event_type"].as_str().unwrap())
            .collect();
        assert_eq!(
            types,
            [
                "OrderPlaced",
                "PaymentSubmitted",
                "PaymentConfirmed",
                "OrderStatusChanged"
            ]
        );
        assert_eq!(events[0]["actor"], "customer");
        assert_eq!(events[2]["actor"], STAFF);
    }
}

mod outbox {
    use super::*;

    #[tokio::test]
    async fn test_confirmation_reaches_customer() {
        let t = setup().await;
        let order = t.place(1).await;
        t.submit(&order, "QAA1111111").await;
        t.verify(&order, json!({"action": "confirm"})).await;

        t.state.outbox.run_catch_up().await.unwrap();

        let sent = t.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::OrderConfirmed);
        assert_eq!(sent[0].recipient(), "baraka@example.co.ke");
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_confirmation() {
        let t = setup().await;
        let order = t.place(1).await;
        t.submit(&order, "QAA1111111").await;
        t.notifier.set_fail_always(true);

        let (status, _) = t.verify(&order, json!({"action": "confirm"})).await;
        assert_eq!(status, StatusCode::OK);
        t.state.outbox.run_catch_up().await.unwrap();

        assert!(t.notifier.sent().is_empty());
        let uri = format!("/orders/{}", order["id"].as_str().unwrap());
        let (_, current) = t.send("GET", &uri, None, None).await;
        assert_eq!(current["status"], "processing");
        assert_eq!(t.stock().await, 4);
    }

    #[tokio::test]
    async fn test_commits_wake_the_worker() {
        let mut t = setup().await;
        t.place(1).await;

        assert_eq!(t.outbox.wakeups.try_recv(), Ok(()));
        assert!(t.outbox.wakeups.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delivered_order_leaves_the_relay() {
        let t = setup().await;
        let order = t.place(1).await;
        t.place(1).await;
        t.submit(&order, "QAA1111111").await;
        t.verify(&order, json!({"action": "confirm"})).await;
        t.state.outbox.run_catch_up().await.unwrap();
        assert_eq!(t.outbox.relay.tracked_orders().await, 2);

        let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());
        let (status, _) = t
            .send("PUT", &uri, Some(STAFF), Some(json!({"status": "delivered"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        t.state.outbox.run_catch_up().await.unwrap();

        assert_eq!(t.outbox.relay.tracked_orders().await, 1);
        let kinds: Vec<_> = t.notifier.sent().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            [
                NotificationKind::OrderConfirmed,
                NotificationKind::OrderStatusChanged
            ]
        );
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup().await;
    t.place(1).await;

    let (status, _) = t.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
