//! Integration tests for the HTTP surface.
//!
//! The router runs over the in-memory store with a fake payment gateway, so
//! no database or network access is needed.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use wscf_store::domain::aggregates::{Coupon, CouponDraft, CouponType, Product, ProductDraft};
use wscf_store::domain::value_objects::CouponCode;
use wscf_store::services::payments::sign_payload;
use wscf_store::services::{JwtIdentity, LogPublisher, PaymentGateway, PaymentIntent, Role};
use wscf_store::store::{CouponRepository, MemoryStorage, OrderRepository, ProductRepository};
use wscf_store::{router, AppState, Config};

const JWT_SECRET: &str = "test-secret-key-for-testing-only-32chars";
const WEBHOOK_SECRET: &str = "whsec_test_secret";

// =============================================================================
// Test Harness
// =============================================================================

struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, amount: i64, currency: &str, _order_id: Option<Uuid>) -> wscf_store::Result<PaymentIntent> {
        Ok(PaymentIntent { client_secret: format!("secret_{}_{}", amount, currency), payment_intent_id: "pi_fake".into() })
    }
}

struct TestApp {
    app: Router,
    store: Arc<MemoryStorage>,
    identity: JwtIdentity,
}

impl TestApp {
    fn new() -> Self {
        let config = Config::for_secrets(JWT_SECRET, Some(WEBHOOK_SECRET.to_string()));
        let store = Arc::new(MemoryStorage::new());
        let state = AppState::new(&config, store.clone(), Some(Arc::new(FakeGateway)), Arc::new(LogPublisher));
        Self { app: router(state), store, identity: JwtIdentity::new(JWT_SECRET.as_bytes()) }
    }

    fn token(&self, role: Role) -> (Uuid, String) {
        let user_id = Uuid::now_v7();
        (user_id, self.identity.issue(user_id, role, Duration::hours(1)).unwrap())
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        self.dispatch(req).await
    }

    async fn dispatch(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn product(&self, name: &str, price: i64, stock: i64) -> Product {
        let product = Product::create(ProductDraft { name: name.into(), price, stock, is_active: true, ..Default::default() }).unwrap();
        self.store.insert_product(&product).await.unwrap();
        product
    }

    async fn coupon(&self, code: &str, usage_limit: Option<i64>) -> Coupon {
        let now = Utc::now();
        let coupon = Coupon::create(CouponDraft {
            code: CouponCode::new(code).unwrap(), description: "10% off".into(), kind: CouponType::Percentage,
            value: Decimal::from(10), min_order_amount: 2000, max_discount: Some(5000), usage_limit,
            start_date: now - Duration::days(1), end_date: now + Duration::days(30), is_active: true,
        }).unwrap();
        self.store.insert_coupon(&coupon).await.unwrap();
        coupon
    }
}

fn address() -> Value {
    json!({
        "fullName": "Ayesha Khan", "phone": "03001234567", "street": "12 Mall Road",
        "city": "Lahore", "state": "Punjab", "zipCode": "54000"
    })
}

fn order_body(lines: &[(&Product, u32)]) -> Value {
    let items: Vec<Value> = lines.iter()
        .map(|(p, qty)| json!({ "productId": p.id, "name": p.name, "quantity": qty }))
        .collect();
    json!({ "items": items, "shippingAddress": address(), "paymentMethod": "cod" })
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_products_is_public_and_lenient() {
    let app = TestApp::new();
    app.product("Leather Case", 1500, 3).await;
    app.product("USB-C Cable", 500, 10).await;

    let (status, body) = app.send(Method::GET, "/products?sort=price-asc&page=abc&limit=-4&minPrice=x", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"][0]["name"], "USB-C Cable");
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 12, "total": 2, "pages": 1 }));
}

#[tokio::test]
async fn test_product_detail_by_slug() {
    let app = TestApp::new();
    let product = app.product("Leather Case", 1500, 3).await;
    let (status, body) = app.send(Method::GET, "/products/leather-case", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["id"], json!(product.id));
    assert_eq!(body["product"]["category"], Value::Null);
    assert_eq!(body["related"], json!([]));

    let (status, body) = app.send(Method::GET, "/products/no-such-thing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Product not found");
}

#[tokio::test]
async fn test_product_admin_requires_admin_role() {
    let app = TestApp::new();
    let (_, user) = app.token(Role::User);
    let (_, admin) = app.token(Role::Admin);
    let body = json!({ "name": "Magnetic Charger", "price": 2500, "stock": 4 });

    let (status, _) = app.send(Method::POST, "/products", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, resp) = app.send(Method::POST, "/products", Some(&user), Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["error"], "Unauthorized: admin access required");

    let (status, resp) = app.send(Method::POST, "/products", Some(&admin), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["product"]["slug"], "magnetic-charger");
    assert_eq!(resp["product"]["sold"], 0);

    let (status, _) = app.send(Method::POST, "/products", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, resp) = app.send(Method::POST, "/products", Some(&admin), Some(json!({ "name": "", "price": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "Product name is required");
}

#[tokio::test]
async fn test_categories_with_counts() {
    let app = TestApp::new();
    let (_, admin) = app.token(Role::Admin);
    let (status, resp) = app.send(Method::POST, "/categories", Some(&admin), Some(json!({ "name": "Power Banks", "order": 2 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = resp["category"]["id"].clone();

    let product = json!({ "name": "20000mAh Bank", "price": 4500, "stock": 2, "categoryId": category_id });
    app.send(Method::POST, "/products", Some(&admin), Some(product)).await;

    let (status, resp) = app.send(Method::GET, "/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["categories"][0]["slug"], "power-banks");
    assert_eq!(resp["categories"][0]["productCount"], 1);

    let (_, resp) = app.send(Method::GET, "/products?category=power-banks", None, None).await;
    assert_eq!(resp["pagination"]["total"], 1);
    assert_eq!(resp["products"][0]["category"]["name"], "Power Banks");
}

// =============================================================================
// Coupons
// =============================================================================

#[tokio::test]
async fn test_apply_coupon() {
    let app = TestApp::new();
    app.coupon("WELCOME10", None).await;
    let (_, token) = app.token(Role::User);

    let (status, _) = app.send(Method::POST, "/coupons/apply", None, Some(json!({ "code": "WELCOME10", "subtotal": 6000 }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::POST, "/coupons/apply", Some(&token), Some(json!({ "code": "welcome10", "subtotal": 6000 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "coupon": { "code": "WELCOME10", "type": "percentage", "value": 10.0 }, "discount": 600 }));

    let (status, body) = app.send(Method::POST, "/coupons/apply", Some(&token), Some(json!({ "code": "BOGUS", "subtotal": 6000 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid coupon code");

    let (status, body) = app.send(Method::POST, "/coupons/apply", Some(&token), Some(json!({ "code": "WELCOME10", "subtotal": 1500 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Minimum order amount is 2000");
}

#[tokio::test]
async fn test_coupon_admin_normalises_code() {
    let app = TestApp::new();
    let (_, admin) = app.token(Role::Admin);
    let end = (Utc::now() + Duration::days(7)).to_rfc3339();
    let body = json!({ "code": " flat200 ", "type": "fixed", "value": 200, "endDate": end });

    let (status, resp) = app.send(Method::POST, "/coupons", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["coupon"]["code"], "FLAT200");
    assert_eq!(resp["coupon"]["usedCount"], 0);

    let (status, resp) = app.send(Method::GET, "/coupons", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["coupons"].as_array().map(Vec::len), Some(1));
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_create_order_below_free_shipping() {
    let app = TestApp::new();
    let product = app.product("Phone Case", 1000, 5).await;
    let (_, token) = app.token(Role::User);

    let (status, body) = app.send(Method::POST, "/orders", Some(&token), Some(order_body(&[(&product, 2)]))).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = &body["order"];
    assert_eq!(order["orderNumber"], "WSCF-001001");
    assert_eq!((order["subtotal"].clone(), order["shippingCost"].clone(), order["total"].clone()), (json!(2000), json!(200), json!(2200)));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["isPaid"], false);
    assert_eq!(order["shippingAddress"]["country"], "Pakistan");
    assert_eq!(order["items"][0]["unitPrice"], 1000);

    let stored = app.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!((stored.stock, stored.sold), (3, 2));
}

#[tokio::test]
async fn test_create_order_with_coupon_counts_usage() {
    let app = TestApp::new();
    let product = app.product("Earbuds", 3000, 5).await;
    let coupon = app.coupon("WELCOME10", Some(1)).await;
    let (_, token) = app.token(Role::User);

    let mut body = order_body(&[(&product, 2)]);
    body["couponCode"] = json!("WELCOME10");
    body["discount"] = json!(600);
    let (status, resp) = app.send(Method::POST, "/orders", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["order"]["discount"], 600);
    assert_eq!(resp["order"]["shippingCost"], 0);
    assert_eq!(resp["order"]["total"], 5400);
    assert_eq!(resp["order"]["couponCode"], "WELCOME10");

    let stored = app.store.find_coupon_by_code(&coupon.code).await.unwrap().unwrap();
    assert_eq!(stored.used_count, 1);

    let (status, resp) = app.send(Method::POST, "/orders", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "This coupon has expired or is no longer valid");
}

#[tokio::test]
async fn test_create_order_is_all_or_nothing() {
    let app = TestApp::new();
    let plenty = app.product("Screen Guard", 300, 10).await;
    let scarce = app.product("Wireless Charger", 2500, 1).await;
    let (_, token) = app.token(Role::User);

    let (status, body) = app.send(Method::POST, "/orders", Some(&token), Some(order_body(&[(&plenty, 3), (&scarce, 2)]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock for Wireless Charger"));

    assert_eq!(app.store.get_product(plenty.id).await.unwrap().unwrap().stock, 10);
    assert_eq!(app.store.get_product(scarce.id).await.unwrap().unwrap().stock, 1);
    let (orders, _) = app.store.list_orders(&Default::default(), wscf_store::store::PageRequest { page: 1, limit: 10 }).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_create_order_rejections() {
    let app = TestApp::new();
    let product = app.product("Phone Case", 1000, 5).await;
    let (_, token) = app.token(Role::User);

    let (status, body) = app.send(Method::POST, "/orders", Some(&token), Some(order_body(&[]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No order items");

    let mut body = order_body(&[(&product, 1)]);
    body["discount"] = json!(500);
    let (status, _) = app.send(Method::POST, "/orders", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ghost = json!({ "items": [{ "productId": Uuid::now_v7(), "name": "Ghost", "quantity": 1 }], "shippingAddress": address() });
    let (status, body) = app.send(Method::POST, "/orders", Some(&token), Some(ghost)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Product not found: Ghost");

    let mut body = order_body(&[(&product, 1)]);
    body["shippingAddress"]["city"] = json!("");
    let (status, resp) = app.send(Method::POST, "/orders", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "City is required");
}

#[tokio::test]
async fn test_order_visibility() {
    let app = TestApp::new();
    let product = app.product("Phone Case", 1000, 5).await;
    let (_, owner) = app.token(Role::User);
    let (_, stranger) = app.token(Role::User);
    let (_, admin) = app.token(Role::Admin);

    let (_, body) = app.send(Method::POST, "/orders", Some(&owner), Some(order_body(&[(&product, 1)]))).await;
    let uri = format!("/orders/{}", body["order"]["id"].as_str().unwrap());

    assert_eq!(app.send(Method::GET, &uri, Some(&owner), None).await.0, StatusCode::OK);
    assert_eq!(app.send(Method::GET, &uri, Some(&admin), None).await.0, StatusCode::OK);
    assert_eq!(app.send(Method::GET, &uri, Some(&stranger), None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(Method::GET, &uri, None, None).await.0, StatusCode::UNAUTHORIZED);

    let (_, mine) = app.send(Method::GET, "/orders", Some(&owner), None).await;
    assert_eq!(mine["pagination"]["total"], 1);
    let (_, theirs) = app.send(Method::GET, "/orders", Some(&stranger), None).await;
    assert_eq!(theirs["pagination"]["total"], 0);
    let (_, all) = app.send(Method::GET, "/orders?status=pending", Some(&admin), None).await;
    assert_eq!(all["orders"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_order_lifecycle_by_admin() {
    let app = TestApp::new();
    let product = app.product("Phone Case", 1000, 5).await;
    let (_, user) = app.token(Role::User);
    let (_, admin) = app.token(Role::Admin);
    let (_, body) = app.send(Method::POST, "/orders", Some(&user), Some(order_body(&[(&product, 1)]))).await;
    let uri = format!("/orders/{}", body["order"]["id"].as_str().unwrap());

    let (status, _) = app.send(Method::PUT, &uri, Some(&user), Some(json!({ "status": "shipped" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::PUT, &uri, Some(&admin), Some(json!({ "status": "processing" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["isDelivered"], false);
    assert_eq!(body["order"]["deliveredAt"], Value::Null);

    let (_, body) = app.send(Method::PUT, &uri, Some(&admin), Some(json!({ "status": "delivered", "isPaid": true }))).await;
    assert_eq!(body["order"]["isDelivered"], true);
    assert!(body["order"]["deliveredAt"].is_string());
    assert!(body["order"]["paidAt"].is_string());

    let (status, body) = app.send(Method::PUT, &uri, Some(&admin), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot change order status from delivered to cancelled");

    let (status, _) = app.send(Method::PUT, &uri, Some(&admin), Some(json!({ "status": "teleported" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Payments
// =============================================================================

async fn place_card_order(app: &TestApp) -> String {
    let product = app.product("Phone Case", 1000, 5).await;
    let (_, token) = app.token(Role::User);
    let mut body = order_body(&[(&product, 1)]);
    body["paymentMethod"] = json!("stripe");
    let (_, resp) = app.send(Method::POST, "/orders", Some(&token), Some(body)).await;
    resp["order"]["id"].as_str().unwrap().to_string()
}

fn webhook_request(payload: &Value, signature: Option<String>) -> Request<Body> {
    let mut req = Request::builder().method(Method::POST).uri("/payment/webhook").header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        req = req.header("stripe-signature", signature);
    }
    req.body(Body::from(payload.to_string())).unwrap()
}

#[tokio::test]
async fn test_signed_webhook_marks_order_paid() {
    let app = TestApp::new();
    let order_id = place_card_order(&app).await;
    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_live_1", "metadata": { "orderId": order_id } } }
    });
    let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload.to_string().as_bytes()).unwrap();

    let (status, body) = app.dispatch(webhook_request(&payload, Some(signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let order = app.store.get_order(Uuid::parse_str(&order_id).unwrap()).await.unwrap().unwrap();
    assert!(order.is_paid);
    assert!(order.paid_at.is_some());
    assert_eq!(order.payment_result.map(|r| (r.id, r.status)), Some(("pi_live_1".into(), "succeeded".into())));
}

#[tokio::test]
async fn test_forged_webhook_changes_nothing() {
    let app = TestApp::new();
    let order_id = place_card_order(&app).await;
    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_forged", "metadata": { "orderId": order_id } } }
    });
    let forged = sign_payload("whsec_attacker", Utc::now().timestamp(), payload.to_string().as_bytes()).unwrap();

    let (status, body) = app.dispatch(webhook_request(&payload, Some(forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid signature");
    let (status, _) = app.dispatch(webhook_request(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = app.store.get_order(Uuid::parse_str(&order_id).unwrap()).await.unwrap().unwrap();
    assert!(!order.is_paid);
    assert!(order.payment_result.is_none());
}

#[tokio::test]
async fn test_failed_payment_webhook_keeps_unpaid() {
    let app = TestApp::new();
    let order_id = place_card_order(&app).await;
    let payload = json!({
        "type": "payment_intent.payment_failed",
        "data": { "object": { "id": "pi_declined", "metadata": { "orderId": order_id } } }
    });
    let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload.to_string().as_bytes()).unwrap();
    assert_eq!(app.dispatch(webhook_request(&payload, Some(signature))).await.0, StatusCode::OK);

    let order = app.store.get_order(Uuid::parse_str(&order_id).unwrap()).await.unwrap().unwrap();
    assert!(!order.is_paid);
    assert_eq!(order.payment_result.map(|r| r.status), Some("failed".into()));
}

#[tokio::test]
async fn test_create_payment_intent() {
    let app = TestApp::new();
    let (_, token) = app.token(Role::User);

    let (status, body) = app.send(Method::POST, "/payment/create-intent", Some(&token), Some(json!({ "amount": 2200 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "clientSecret": "secret_220000_pkr", "paymentIntentId": "pi_fake" }));

    let (status, body) = app.send(Method::POST, "/payment/create-intent", Some(&token), Some(json!({ "amount": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid amount");

    let (status, _) = app.send(Method::POST, "/payment/create-intent", None, Some(json!({ "amount": 10 }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_stats() {
    let app = TestApp::new();
    let product = app.product("Phone Case", 1000, 5).await;
    let (_, user) = app.token(Role::User);
    let (_, admin) = app.token(Role::Admin);
    let (_, body) = app.send(Method::POST, "/orders", Some(&user), Some(order_body(&[(&product, 1)]))).await;
    let uri = format!("/orders/{}", body["order"]["id"].as_str().unwrap());
    app.send(Method::PUT, &uri, Some(&admin), Some(json!({ "isPaid": true }))).await;

    assert_eq!(app.send(Method::GET, "/admin/stats", Some(&user), None).await.0, StatusCode::UNAUTHORIZED);
    let (status, body) = app.send(Method::GET, "/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"], json!({ "totalOrders": 1, "totalProducts": 1, "totalRevenue": 1200 }));
    assert_eq!(body["ordersByStatus"], json!([{ "status": "pending", "count": 1 }]));
    assert_eq!(body["recentOrders"].as_array().map(Vec::len), Some(1));
}
