//! Order Aggregate
//!
//! An order is assembled once from a cart and the catalog as it is at that
//! instant. Line prices and the totals are frozen at assembly and satisfy
//! `total == subtotal - discount + shipping_cost` for the life of the order.
//! Afterwards only the lifecycle fields (status, payment, delivery) move.

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Coupon, CouponError, Product};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CouponCode, Quantity};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentResult>,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub coupon_code: Option<CouponCode>,
    pub total: i64,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Line snapshot taken at order time. Not a live reference to the product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem { pub product_id: Uuid, pub name: String, pub image: String, pub unit_price: i64, pub quantity: u32 }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { #[default] Stripe, Cod }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str { match self { Self::Stripe => "stripe", Self::Cod => "cod" } }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "stripe" => Ok(Self::Stripe), "cod" => Ok(Self::Cod), other => Err(format!("unknown payment method '{}'", other)) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PaymentResult {
    pub const SUCCEEDED: &'static str = "succeeded";
    pub const FAILED: &'static str = "failed";
    pub fn succeeded(&self) -> bool { self.status == Self::SUCCEEDED }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Position along the fulfilment path; `Cancelled` is off the path.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0), Self::Confirmed => Some(1), Self::Processing => Some(2),
            Self::Shipped => Some(3), Self::Delivered => Some(4), Self::Cancelled => None,
        }
    }

    /// Forward moves may skip steps; cancellation is allowed until a terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() { return false; }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| format!("unknown order status '{}'", s))
    }
}

/// Shipping is free from `free_threshold` upwards, otherwise a flat fee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShippingPolicy { pub free_threshold: i64, pub flat_fee: i64 }

impl Default for ShippingPolicy {
    fn default() -> Self { Self { free_threshold: 5000, flat_fee: 200 } }
}

impl ShippingPolicy {
    pub fn cost_for(&self, subtotal: i64) -> i64 { if subtotal >= self.free_threshold { 0 } else { self.flat_fee } }
}

/// Everything the shopper submits at checkout
#[derive(Clone, Debug)]
pub struct Checkout {
    pub user_id: Uuid,
    pub cart: Cart,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentResult>,
    pub coupon_code: Option<CouponCode>,
    /// Discount the client was quoted. Recomputed server-side when a coupon is given.
    pub discount: i64,
    pub notes: Option<String>,
}

/// A fully priced order that has passed every pre-flight check but has no number yet.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    user_id: Uuid,
    items: Vec<LineItem>,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    payment_result: Option<PaymentResult>,
    subtotal: i64,
    shipping_cost: i64,
    discount: i64,
    coupon_code: Option<CouponCode>,
    total: i64,
    notes: Option<String>,
    now: DateTime<Utc>,
}

impl OrderDraft {
    /// Validates every cart line against `products` before pricing anything.
    ///
    /// `coupon` must be the record for `checkout.coupon_code`, or `None` if no such coupon exists.
    pub fn assemble(
        checkout: Checkout,
        products: &HashMap<Uuid, Product>,
        coupon: Option<&Coupon>,
        shipping: &ShippingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if checkout.cart.is_empty() { return Err(OrderError::EmptyCart); }
        if checkout.discount < 0 { return Err(OrderError::NegativeDiscount); }

        let mut items = Vec::with_capacity(checkout.cart.item_count());
        for line in checkout.cart.lines() {
            let product = products.get(&line.product_id).ok_or_else(|| OrderError::ProductNotFound(line.name.clone()))?;
            if !product.has_stock_for(line.quantity) {
                return Err(OrderError::InsufficientStock {
                    product: product.name.clone(), requested: line.quantity.value(), available: product.stock,
                });
            }
            items.push(LineItem {
                product_id: product.id, name: product.name.clone(), image: product.first_image_url(),
                unit_price: product.price, quantity: line.quantity.value(),
            });
        }

        let subtotal = items
            .iter()
            .try_fold(0i64, |acc, i| i.unit_price.checked_mul(i64::from(i.quantity)).and_then(|line| acc.checked_add(line)))
            .ok_or(OrderError::AmountTooLarge)?;
        let quoted = match (&checkout.coupon_code, coupon) {
            (None, _) if checkout.discount > 0 => return Err(OrderError::DiscountWithoutCoupon),
            (None, _) => 0,
            (Some(_), None) => return Err(CouponError::NotFound.into()),
            (Some(_), Some(coupon)) => {
                let applied = coupon.evaluate(subtotal, now)?;
                if applied.discount != checkout.discount {
                    tracing::debug!(quoted = checkout.discount, applied = applied.discount, "client discount differs from coupon evaluation");
                }
                applied.discount
            }
        };
        let discount = quoted.min(subtotal);
        let shipping_cost = shipping.cost_for(subtotal);
        let total = (subtotal - discount).checked_add(shipping_cost).ok_or(OrderError::AmountTooLarge)?;

        Ok(Self {
            user_id: checkout.user_id, items, shipping_address: checkout.shipping_address,
            payment_method: checkout.payment_method, payment_result: checkout.payment_result,
            subtotal, shipping_cost, discount, coupon_code: checkout.coupon_code,
            total, notes: checkout.notes, now,
        })
    }

    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn coupon_code(&self) -> Option<&CouponCode> { self.coupon_code.as_ref() }
    pub fn total(&self) -> i64 { self.total }

    /// (product, quantity) pairs the placement must move from stock to sold.
    pub fn reservations(&self) -> Vec<(Uuid, Quantity)> {
        self.items.iter().filter_map(|i| Quantity::new(i.quantity).ok().map(|q| (i.product_id, q))).collect()
    }

    /// A client-reported successful `payment_result` marks the order paid here; the signed webhook is the trusted confirmation.
    pub fn into_order(self, order_number: String) -> Order {
        let paid = self.payment_method == PaymentMethod::Stripe && self.payment_result.as_ref().is_some_and(PaymentResult::succeeded);
        let mut order = Order {
            id: Uuid::now_v7(), user_id: self.user_id, order_number, items: self.items,
            shipping_address: self.shipping_address, payment_method: self.payment_method, payment_result: self.payment_result,
            subtotal: self.subtotal, shipping_cost: self.shipping_cost, discount: self.discount, coupon_code: self.coupon_code,
            total: self.total, status: OrderStatus::Pending, is_paid: paid, paid_at: paid.then_some(self.now),
            is_delivered: false, delivered_at: None, notes: self.notes, created_at: self.now, updated_at: self.now,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: order.id, order_number: order.order_number.clone(), user_id: order.user_id, total: order.total,
        }));
        order
    }
}

/// Human readable number, e.g. `WSCF-001001`
pub fn format_order_number(prefix: &str, sequence: i64) -> String { format!("{}{:06}", prefix, sequence) }

/// Admin edit of the lifecycle fields
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderUpdate { pub status: Option<OrderStatus>, pub is_paid: Option<bool> }

impl Order {
    /// Rebuilds an order from storage. Raises no events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, user_id: Uuid, order_number: String, items: Vec<LineItem>, shipping_address: ShippingAddress,
        payment_method: PaymentMethod, payment_result: Option<PaymentResult>, pricing: (i64, i64, i64, i64),
        coupon_code: Option<CouponCode>, status: OrderStatus, paid_at: (bool, Option<DateTime<Utc>>),
        delivered_at: (bool, Option<DateTime<Utc>>), notes: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        let (subtotal, shipping_cost, discount, total) = pricing;
        Self {
            id, user_id, order_number, items, shipping_address, payment_method, payment_result,
            subtotal, shipping_cost, discount, coupon_code, total, status,
            is_paid: paid_at.0, paid_at: paid_at.1, is_delivered: delivered_at.0, delivered_at: delivered_at.1,
            notes, created_at, updated_at, events: vec![],
        }
    }

    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if next == self.status { return Ok(()); }
        if !self.status.can_transition_to(next) { return Err(TransitionError { from: self.status, to: next }); }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Delivered {
            self.is_delivered = true;
            self.delivered_at = Some(now);
        }
        self.touch(now);
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn set_paid(&mut self, paid: bool, now: DateTime<Utc>) {
        if paid == self.is_paid { return; }
        self.is_paid = paid;
        self.paid_at = paid.then_some(now);
        self.touch(now);
        if paid {
            let payment_id = self.payment_result.as_ref().map(|r| r.id.clone());
            self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, payment_id }));
        }
    }

    /// Status first so a rejected transition leaves the payment flag untouched.
    pub fn apply_update(&mut self, update: OrderUpdate, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if let Some(status) = update.status { self.transition(status, now)?; }
        if let Some(paid) = update.is_paid { self.set_paid(paid, now); }
        Ok(())
    }

    /// Gateway confirmed the charge. A repeated confirmation keeps the original `paid_at`.
    pub fn confirm_payment(&mut self, payment_id: String, now: DateTime<Utc>) {
        self.payment_result = Some(PaymentResult {
            id: payment_id, status: PaymentResult::SUCCEEDED.to_string(),
            email: self.payment_result.as_ref().and_then(|r| r.email.clone()),
        });
        if self.is_paid { self.touch(now); return; }
        self.set_paid(true, now);
    }

    /// Gateway declined the charge. `is_paid` is left as it is.
    pub fn record_payment_failure(&mut self, payment_id: String, now: DateTime<Utc>) {
        self.payment_result = Some(PaymentResult {
            id: payment_id.clone(), status: PaymentResult::FAILED.to_string(),
            email: self.payment_result.as_ref().and_then(|r| r.email.clone()),
        });
        self.touch(now);
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id, payment_id }));
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == user_id }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("No order items")]
    EmptyCart,
    #[error("Product not found: {0}")]
    ProductNotFound(String),
    #[error("Insufficient stock for {product} (requested {requested}, available {available})")]
    InsufficientStock { product: String, requested: u32, available: i64 },
    #[error("A discount requires a coupon code")]
    DiscountWithoutCoupon,
    #[error("Discount cannot be negative")]
    NegativeDiscount,
    #[error("Order amount is too large")]
    AmountTooLarge,
    #[error(transparent)]
    Coupon(#[from] CouponError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot change order status from {from} to {to}")]
pub struct TransitionError { pub from: OrderStatus, pub to: OrderStatus }
