//! Checkout consistency under concurrent shoppers.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use wscf_store::domain::aggregates::{
    Cart, Checkout, Coupon, CouponDraft, CouponError, CouponType, OrderError, OrderStatus, OrderUpdate, PaymentMethod,
    Product, ProductDraft, ShippingAddress, ShippingPolicy,
};
use wscf_store::domain::value_objects::{CouponCode, Quantity};
use wscf_store::services::{LogPublisher, OrderService};
use wscf_store::store::{CouponRepository, MemoryStorage, ProductRepository};
use wscf_store::ShopError;

// =============================================================================
// Fixtures
// =============================================================================

fn service(store: Arc<MemoryStorage>) -> Arc<OrderService> {
    Arc::new(OrderService::new(store, Arc::new(LogPublisher), ShippingPolicy::default(), "WSCF-"))
}

async fn stocked(store: &MemoryStorage, name: &str, price: i64, stock: i64) -> Product {
    let product = Product::create(ProductDraft { name: name.into(), price, stock, is_active: true, ..Default::default() }).unwrap();
    store.insert_product(&product).await.unwrap();
    product
}

fn checkout(lines: &[(&Product, u32)], coupon: Option<&str>) -> Checkout {
    let mut cart = Cart::new();
    for (product, qty) in lines {
        cart.add(product.id, product.name.clone(), Quantity::new(*qty).unwrap());
    }
    Checkout {
        user_id: Uuid::now_v7(),
        cart,
        shipping_address: ShippingAddress {
            full_name: "Sana Malik".into(), phone: "03331234567".into(), street: "9 Jail Road".into(),
            city: "Lahore".into(), state: "Punjab".into(), zip_code: "54000".into(), country: "Pakistan".into(),
        },
        payment_method: PaymentMethod::Cod,
        payment_result: None,
        coupon_code: coupon.map(|c| CouponCode::new(c).unwrap()),
        discount: 0,
        notes: None,
    }
}

// =============================================================================
// Stock
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_exactly_one_shopper() {
    let store = Arc::new(MemoryStorage::new());
    let product = stocked(&store, "Wireless Charger", 2500, 1).await;
    let orders = service(store.clone());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let orders = orders.clone();
            let request = checkout(&[(&product, 1)], None);
            tokio::spawn(async move { orders.place(request).await })
        })
        .collect();

    let mut placed = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(ShopError::Order(OrderError::InsufficientStock { .. })) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!((placed, out_of_stock), (1, 1));

    let stored = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!((stored.stock, stored.sold), (0, 1));
}

#[tokio::test]
async fn test_failing_line_leaves_every_product_untouched() {
    let store = Arc::new(MemoryStorage::new());
    let cable = stocked(&store, "USB-C Cable", 500, 10).await;
    let charger = stocked(&store, "Wireless Charger", 2500, 1).await;
    let orders = service(store.clone());

    let err = orders.place(checkout(&[(&cable, 4), (&charger, 3)], None)).await.unwrap_err();
    assert!(matches!(err, ShopError::Order(OrderError::InsufficientStock { requested: 3, available: 1, .. })));

    let cable = store.get_product(cable.id).await.unwrap().unwrap();
    assert_eq!((cable.stock, cable.sold), (10, 0));
}

#[tokio::test]
async fn test_overflowing_total_is_rejected_without_reserving() {
    let store = Arc::new(MemoryStorage::new());
    let vault = stocked(&store, "Diamond Case", i64::MAX / 2, 5).await;
    let orders = service(store.clone());

    let err = orders.place(checkout(&[(&vault, 3)], None)).await.unwrap_err();
    assert!(matches!(err, ShopError::Order(OrderError::AmountTooLarge)));
    assert_eq!(store.get_product(vault.id).await.unwrap().unwrap().stock, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_get_unique_sequential_numbers() {
    let store = Arc::new(MemoryStorage::new());
    let product = stocked(&store, "Screen Guard", 300, 100).await;
    let orders = service(store.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let orders = orders.clone();
            let request = checkout(&[(&product, 1)], None);
            tokio::spawn(async move { orders.place(request).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap().unwrap().order_number);
    }
    let expected: HashSet<String> = (1001..=1020).map(|n| format!("WSCF-{:06}", n)).collect();
    assert_eq!(numbers, expected);
    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 80);
}

// =============================================================================
// Coupons
// =============================================================================

async fn welcome(store: &MemoryStorage, usage_limit: Option<i64>) -> Coupon {
    let now = Utc::now();
    let coupon = Coupon::create(CouponDraft {
        code: CouponCode::new("WELCOME10").unwrap(), description: String::new(), kind: CouponType::Percentage,
        value: Decimal::from(10), min_order_amount: 2000, max_discount: Some(5000), usage_limit,
        start_date: now - Duration::hours(1), end_date: now + Duration::days(1), is_active: true,
    }).unwrap();
    store.insert_coupon(&coupon).await.unwrap();
    coupon
}

#[tokio::test]
async fn test_coupon_priced_server_side() {
    let store = Arc::new(MemoryStorage::new());
    let earbuds = stocked(&store, "Earbuds", 3000, 5).await;
    welcome(&store, None).await;

    let mut request = checkout(&[(&earbuds, 2)], Some("welcome10"));
    request.discount = 5999;
    let order = service(store).place(request).await.unwrap();
    assert_eq!((order.subtotal, order.discount, order.shipping_cost, order.total), (6000, 600, 0, 5400));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_use_coupon_redeemed_once() {
    let store = Arc::new(MemoryStorage::new());
    let earbuds = stocked(&store, "Earbuds", 3000, 10).await;
    let coupon = welcome(&store, Some(1)).await;
    let orders = service(store.clone());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let orders = orders.clone();
            let request = checkout(&[(&earbuds, 1)], Some("WELCOME10"));
            tokio::spawn(async move { orders.place(request).await })
        })
        .collect();

    let mut redeemed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(order) => { assert_eq!(order.discount, 300); redeemed += 1; }
            Err(e) => assert!(matches!(e, ShopError::Order(OrderError::Coupon(CouponError::ExpiredOrInactive))), "unexpected error: {:?}", e),
        }
    }
    assert_eq!(redeemed, 1);

    let stored = store.find_coupon_by_code(&coupon.code).await.unwrap().unwrap();
    assert_eq!(stored.used_count, 1);
    // the rejected checkout reserved nothing
    assert_eq!(store.get_product(earbuds.id).await.unwrap().unwrap().stock, 9);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_delivery_fields_follow_status() {
    let store = Arc::new(MemoryStorage::new());
    let case = stocked(&store, "Phone Case", 1000, 5).await;
    let orders = service(store);
    let order = orders.place(checkout(&[(&case, 1)], None)).await.unwrap();

    let processing = orders.update(order.id, OrderUpdate { status: Some(OrderStatus::Processing), is_paid: None }).await.unwrap();
    assert!(!processing.is_delivered);
    let delivered = orders.update(order.id, OrderUpdate { status: Some(OrderStatus::Delivered), is_paid: None }).await.unwrap();
    assert!(delivered.is_delivered);
    assert!(delivered.delivered_at.is_some());

    let err = orders.update(order.id, OrderUpdate { status: Some(OrderStatus::Pending), is_paid: None }).await.unwrap_err();
    assert!(matches!(err, ShopError::Transition(_)));
}
