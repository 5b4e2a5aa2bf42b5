//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use commerce::{CommerceConfig, GatewayConfig, InMemoryPaymentGateway, NewProduct, signature};
use common::{OrderId, UserId};
use domain::{Money, NewVariant};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

const SERVER_KEY: &str = "api-test-key";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
    _state: Arc<AppState<InMemoryStore>>,
}

fn setup() -> TestApp {
    let config = CommerceConfig {
        gateway: GatewayConfig::new(SERVER_KEY),
        ..CommerceConfig::default()
    };
    let (state, store, gateway) = api::create_default_state(config);
    let app = api::create_app(state.clone(), get_metrics_handle());
    TestApp {
        app,
        store,
        gateway,
        _state: state,
    }
}

#[derive(Clone, Copy)]
enum Caller {
    Anonymous,
    Customer(UserId),
    Admin(UserId),
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Caller,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        match caller {
            Caller::Anonymous => {}
            Caller::Customer(id) | Caller::Admin(id) => {
                builder = builder
                    .header("x-user-id", id.to_string())
                    .header("x-user-email", "dewi@example.com")
                    .header("x-user-name", "Dewi");
            }
        }
        if let Caller::Admin(_) = caller {
            builder = builder.header("x-user-role", "admin");
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
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

    async fn create_product(&self, stock: u32) -> String {
        let product = NewProduct {
            name: "Ceramic Mug".into(),
            price: Money::from_units(100_000),
            weight_grams: 350,
            has_variant: false,
            stock,
            variants: vec![],
        };
        let (status, json) = self
            .send(
                "POST",
                "/admin/products",
                Caller::Admin(UserId::new()),
                Some(serde_json::to_value(&product).unwrap()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    async fn add_to_cart(&self, user: UserId, product_id: &str, quantity: u32) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/carts",
            Caller::Customer(user),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await
    }

    async fn webhook(&self, order_id: &str, status: &str, signature_key: &str) -> (StatusCode, Value) {
        let body = json!({
            "order_id": order_id,
            "transaction_id": "tx-1",
            "transaction_status": status,
            "status_code": "200",
            "gross_amount": "90000.00",
            "signature_key": signature_key,
            "payment_type": "qris",
        });
        self.send("POST", "/payments/notifications", Caller::Anonymous, Some(body))
            .await
    }
}

fn sign(order_id: &str) -> String {
    signature::compute(order_id, "200", "90000.00", SERVER_KEY)
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let (status, json) = t.send("GET", "/health", Caller::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_cart_requires_identity() {
    let t = setup();
    let (status, json) = t.send("GET", "/carts", Caller::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["reason"], "unauthorized");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let t = setup();
    let (status, json) = t
        .send("GET", "/admin/orders", Caller::Customer(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["reason"], "forbidden");
}

#[tokio::test]
async fn test_product_with_variants() {
    let t = setup();
    let product = NewProduct {
        name: "Linen Shirt".into(),
        price: Money::from_units(150_000),
        weight_grams: 200,
        has_variant: true,
        stock: 0,
        variants: vec![NewVariant {
            color: "Sand".into(),
            size: "M".into(),
            stock: 5,
        }],
    };
    let (status, created) = t
        .send(
            "POST",
            "/admin/products",
            Caller::Admin(UserId::new()),
            Some(serde_json::to_value(&product).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = t
        .send("GET", &format!("/products/{id}"), Caller::Anonymous, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["policy"]["variants"][0]["color"], "Sand");

    let user = UserId::new();
    let (status, json) = t.add_to_cart(user, id, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "variant_required");
}

#[tokio::test]
async fn test_cart_checkout_and_settlement() {
    let t = setup();
    let product_id = t.create_product(10).await;
    let user = UserId::new();

    let (status, item) = t.add_to_cart(user, &product_id, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["quantity"], 3);

    let (status, cart) = t.send("GET", "/carts", Caller::Customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["state"], "items");
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);

    let (status, receipt) = t
        .send("POST", "/orders/checkout", Caller::Customer(user), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(receipt["token"].as_str().is_some());
    assert!(receipt["redirect_url"].as_str().is_some());
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    let (_, cart) = t.send("GET", "/carts", Caller::Customer(user), None).await;
    assert_eq!(cart["state"], "pending_payment");
    assert_eq!(cart["token"], receipt["token"]);

    let parsed = OrderId::parse(&order_id).unwrap();
    t.gateway.set_status(parsed, "settlement", None).await;
    let (status, outcome) = t.webhook(&order_id, "settlement", &sign(&order_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "applied");
    assert_eq!(outcome["to"], "paid");

    let (status, orders) = t.send("GET", "/orders", Caller::Customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders[0]["payment_status"], "paid");
    assert_eq!(orders[0]["is_paid"], true);

    let (status, payments) = t
        .send(
            "GET",
            &format!("/admin/orders/{order_id}/payments"),
            Caller::Admin(UserId::new()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments[0]["payload"]["payment_type"], "qris");
}

#[tokio::test]
async fn test_webhook_with_bad_signature() {
    let t = setup();
    let product_id = t.create_product(10).await;
    let user = UserId::new();
    t.add_to_cart(user, &product_id, 1).await;
    let (_, receipt) = t
        .send("POST", "/orders/checkout", Caller::Customer(user), None)
        .await;
    let order_id = receipt["order_id"].as_str().unwrap();

    let (status, json) = t.webhook(order_id, "cancel", "forged").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["reason"], "invalid_signature");
    assert_eq!(json["error"], "unauthorized");
    assert_eq!(t.store.payment_count().await, 0);
}

#[tokio::test]
async fn test_webhook_with_malformed_body() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/notifications")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_beyond_stock_is_conflict() {
    let t = setup();
    let product_id = t.create_product(2).await;
    let (status, json) = t.add_to_cart(UserId::new(), &product_id, 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["reason"], "insufficient_stock");
}

#[tokio::test]
async fn test_checkout_without_cart() {
    let t = setup();
    let (status, json) = t
        .send("POST", "/orders/checkout", Caller::Customer(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["reason"], "cart_not_found");
}

#[tokio::test]
async fn test_second_checkout_returns_pending_session() {
    let t = setup();
    let product_id = t.create_product(10).await;
    let user = UserId::new();
    t.add_to_cart(user, &product_id, 1).await;
    let (_, receipt) = t
        .send("POST", "/orders/checkout", Caller::Customer(user), None)
        .await;
    t.add_to_cart(user, &product_id, 1).await;

    let (status, json) = t
        .send("POST", "/orders/checkout", Caller::Customer(user), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["reason"], "payment_pending");
    assert_eq!(json["redirect_url"], receipt["redirect_url"]);
}

#[tokio::test]
async fn test_partial_checkout_body() {
    let t = setup();
    let first = t.create_product(10).await;
    let second = t.create_product(10).await;
    let user = UserId::new();
    let (_, line) = t.add_to_cart(user, &first, 1).await;
    t.add_to_cart(user, &second, 1).await;

    let (status, _) = t
        .send(
            "POST",
            "/orders/checkout",
            Caller::Customer(user),
            Some(json!({ "selected_items": [line["id"]] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(t.store.cart_item_count().await, 1);
}

#[tokio::test]
async fn test_update_and_remove_cart_item() {
    let t = setup();
    let product_id = t.create_product(10).await;
    let user = UserId::new();
    let (_, item) = t.add_to_cart(user, &product_id, 1).await;
    let item_id = item["id"].as_str().unwrap();

    let (status, updated) = t
        .send(
            "PUT",
            &format!("/carts/items/{item_id}"),
            Caller::Customer(user),
            Some(json!({ "quantity": 4, "note": "gift wrap" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], 4);
    assert_eq!(updated["note"], "gift wrap");

    let (status, _) = t
        .send(
            "DELETE",
            &format!("/carts/items/{item_id}"),
            Caller::Customer(user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = t
        .send(
            "DELETE",
            &format!("/carts/items/{item_id}"),
            Caller::Customer(user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["reason"], "cart_item_not_found");
}

#[tokio::test]
async fn test_admin_status_override() {
    let t = setup();
    let product_id = t.create_product(10).await;
    let user = UserId::new();
    t.add_to_cart(user, &product_id, 1).await;
    let (_, receipt) = t
        .send("POST", "/orders/checkout", Caller::Customer(user), None)
        .await;
    let order_id = receipt["order_id"].as_str().unwrap();
    let admin = Caller::Admin(UserId::new());

    let (status, json) = t
        .send(
            "PUT",
            &format!("/admin/orders/{order_id}/status"),
            admin,
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "bad_request");

    let (status, order) = t
        .send(
            "PUT",
            &format!("/admin/orders/{order_id}/status"),
            admin,
            Some(json!({ "status": "shipped" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "shipped");

    let (status, _) = t
        .send("DELETE", &format!("/admin/orders/{order_id}"), admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t
        .send(
            "GET",
            &format!("/orders/{order_id}"),
            Caller::Customer(user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_path_id() {
    let t = setup();
    let (status, json) = t
        .send("GET", "/orders/not-a-uuid", Caller::Customer(UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "bad_request");
}

#[tokio::test]
async fn test_refund_route() {
    let t = setup();
    let (status, json) = t
        .send(
            "POST",
            "/admin/payments/refund",
            Caller::Admin(UserId::new()),
            Some(json!({
                "transaction_id": "tx-7",
                "amount": Money::from_units(10_000),
                "reason": "damaged",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transaction_id"], "tx-7");
    assert_eq!(t.gateway.refunds().await.len(), 1);
}
