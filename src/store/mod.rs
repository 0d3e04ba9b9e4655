//! Persistence.
//!
//! The storage backend is the only arbiter of consistency: every operation
//! that touches more than one record (order placement, lifecycle edits) is
//! atomic inside the implementation, never spread across calls.

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Category, Checkout, Coupon, Order, OrderStatus, Product, ShippingPolicy};
use crate::domain::value_objects::{CouponCode, Slug};
use crate::Result;

/// In-place edit applied to a locked record. Returning an error aborts the edit with nothing written.
pub type Edit<T> = Box<dyn FnOnce(&mut T) -> Result<()> + Send>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductFilter {
    pub active_only: bool,
    pub category_id: Option<Uuid>,
    /// Case-insensitive match against name, description or any tag
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub featured_only: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProductSort { #[default] Newest, PriceAsc, PriceDesc, Popular, Rating }

/// 1-indexed offset pagination
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest { pub page: u32, pub limit: u32 }

impl PageRequest {
    pub fn offset(&self) -> u64 { u64::from(self.page.saturating_sub(1)) * u64::from(self.limit) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter { pub user_id: Option<Uuid>, pub status: Option<OrderStatus> }

#[derive(Clone, Debug, Default)]
pub struct OrderStats {
    pub total_orders: u64,
    pub total_revenue: i64,
    pub by_status: Vec<(OrderStatus, u64)>,
    pub recent: Vec<Order>,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// One page of matches plus the total number of matches.
    async fn list_products(&self, filter: &ProductFilter, sort: ProductSort, page: PageRequest) -> Result<(Vec<Product>, u64)>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn get_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>>;
    /// Other active products of the same category
    async fn related_products(&self, product: &Product, limit: u32) -> Result<Vec<Product>>;
    async fn count_active_products(&self, category_id: Option<Uuid>) -> Result<u64>;
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn modify_product(&self, id: Uuid, edit: Edit<Product>) -> Result<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Sorted by display order
    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>>;
    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn modify_category(&self, id: Uuid, edit: Edit<Category>) -> Result<Option<Category>>;
    /// Products keep their (now dangling) category reference.
    async fn delete_category(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Newest first
    async fn list_coupons(&self) -> Result<Vec<Coupon>>;
    async fn find_coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>>;
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<()>;
    async fn modify_coupon(&self, id: Uuid, edit: Edit<Coupon>) -> Result<Option<Coupon>>;
    async fn delete_coupon(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Prices the checkout against the current catalog and, in one atomic step, moves stock to
    /// sold for every line, redeems the coupon, draws the next order number and persists the order.
    /// Any failure leaves every record untouched.
    async fn place_order(&self, checkout: Checkout, shipping: &ShippingPolicy, number_prefix: &str) -> Result<Order>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;
    /// Newest first
    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, u64)>;
    /// Applies a lifecycle edit under a lock on the order. Items and pricing are never rewritten.
    async fn modify_order(&self, id: Uuid, edit: Edit<Order>) -> Result<Option<Order>>;
    async fn order_stats(&self, recent: u32) -> Result<OrderStats>;
}

#[async_trait]
pub trait Storage: ProductRepository + CategoryRepository + CouponRepository + OrderRepository {
    async fn ping(&self) -> Result<()>;
}
