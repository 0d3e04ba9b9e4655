//! In-process storage. One lock guards every table, so each call is serialised
//! and order placement is trivially all-or-nothing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CategoryRepository, CouponRepository, Edit, OrderFilter, OrderRepository, OrderStats, PageRequest, ProductFilter,
    ProductRepository, ProductSort, Storage,
};
use crate::domain::aggregates::{
    format_order_number, Category, Checkout, Coupon, Order, OrderDraft, OrderError, OrderStatus, Product, ShippingPolicy,
};
use crate::domain::value_objects::{CouponCode, Slug};
use crate::{Result, ShopError};

const FIRST_ORDER_SEQUENCE: i64 = 1001;

#[derive(Default)]
struct Tables {
    // Vecs keep insertion order, which is the natural order ties fall back to.
    products: Vec<Product>,
    categories: Vec<Category>,
    coupons: Vec<Coupon>,
    orders: Vec<Order>,
    issued_orders: i64,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl Tables {
    fn next_order_sequence(&mut self) -> i64 {
        let seq = FIRST_ORDER_SEQUENCE + self.issued_orders;
        self.issued_orders += 1;
        seq
    }

    fn check_product_unique(&self, product: &Product) -> Result<()> {
        for other in self.products.iter().filter(|p| p.id != product.id) {
            if other.slug == product.slug { return Err(ShopError::Conflict(format!("Product slug '{}'", product.slug))); }
            if product.sku.is_some() && other.sku == product.sku {
                return Err(ShopError::Conflict(format!("SKU '{}'", other.sku.as_ref().map(|s| s.as_str()).unwrap_or_default())));
            }
        }
        Ok(())
    }

    fn check_category_unique(&self, category: &Category) -> Result<()> {
        if self.categories.iter().any(|c| c.id != category.id && c.slug == category.slug) {
            return Err(ShopError::Conflict(format!("Category slug '{}'", category.slug)));
        }
        Ok(())
    }

    fn check_coupon_unique(&self, coupon: &Coupon) -> Result<()> {
        if self.coupons.iter().any(|c| c.id != coupon.id && c.code == coupon.code) {
            return Err(ShopError::Conflict(format!("Coupon code '{}'", coupon.code)));
        }
        Ok(())
    }
}

fn matches(product: &Product, filter: &ProductFilter) -> bool {
    if filter.active_only && !product.is_active { return false; }
    if filter.featured_only && !product.is_featured { return false; }
    if filter.category_id.is_some() && product.category_id != filter.category_id { return false; }
    if filter.min_price.is_some_and(|min| product.price < min) { return false; }
    if filter.max_price.is_some_and(|max| product.price > max) { return false; }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let hit = product.name.to_lowercase().contains(&needle)
            || product.description.to_lowercase().contains(&needle)
            || product.tags.iter().any(|t| t.to_lowercase().contains(&needle));
        if !hit { return false; }
    }
    true
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    items.iter().skip(offset).take(page.limit as usize).cloned().collect()
}

/// Replaces the record with id `id` by an edited copy once `edit` and `check` both succeed.
fn modify_in<T: Clone>(
    rows: &mut [T],
    find: impl Fn(&T) -> bool,
    edit: Edit<T>,
    check: impl FnOnce(&T) -> Result<()>,
) -> Result<Option<T>> {
    let Some(slot) = rows.iter_mut().find(|r| find(r)) else { return Ok(None) };
    let mut copy = slot.clone();
    edit(&mut copy)?;
    check(&copy)?;
    *slot = copy.clone();
    Ok(Some(copy))
}

#[async_trait]
impl ProductRepository for MemoryStorage {
    async fn list_products(&self, filter: &ProductFilter, sort: ProductSort, page: PageRequest) -> Result<(Vec<Product>, u64)> {
        let t = self.tables.lock().await;
        let mut hits: Vec<&Product> = t.products.iter().filter(|p| matches(p, filter)).collect();
        // sort_by is stable: ties keep insertion order
        match sort {
            ProductSort::Newest => hits.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::PriceAsc => hits.sort_by_key(|p| p.price),
            ProductSort::PriceDesc => hits.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::Popular => hits.sort_by(|a, b| b.sold.cmp(&a.sold)),
            ProductSort::Rating => hits.sort_by(|a, b| b.rating_average.total_cmp(&a.rating_average)),
        }
        let total = hits.len() as u64;
        let hits: Vec<Product> = hits.into_iter().cloned().collect();
        Ok((page_of(&hits, page), total))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.iter().find(|p| &p.slug == slug).cloned())
    }

    async fn related_products(&self, product: &Product, limit: u32) -> Result<Vec<Product>> {
        let Some(category_id) = product.category_id else { return Ok(vec![]) };
        let t = self.tables.lock().await;
        Ok(t.products.iter()
            .filter(|p| p.id != product.id && p.is_active && p.category_id == Some(category_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_active_products(&self, category_id: Option<Uuid>) -> Result<u64> {
        let t = self.tables.lock().await;
        Ok(t.products.iter().filter(|p| p.is_active && (category_id.is_none() || p.category_id == category_id)).count() as u64)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.check_product_unique(product)?;
        t.products.push(product.clone());
        Ok(())
    }

    async fn modify_product(&self, id: Uuid, edit: Edit<Product>) -> Result<Option<Product>> {
        let mut guard = self.tables.lock().await;
        let t = &mut *guard;
        let others = Tables { products: t.products.clone(), ..Default::default() };
        modify_in(&mut t.products, |p| p.id == id, edit, |p| others.check_product_unique(p))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        Ok(t.products.len() != before)
    }
}

#[async_trait]
impl CategoryRepository for MemoryStorage {
    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let t = self.tables.lock().await;
        let mut categories: Vec<Category> = t.categories.iter().filter(|c| !active_only || c.is_active).cloned().collect();
        categories.sort_by_key(|c| c.order);
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.tables.lock().await.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>> {
        Ok(self.tables.lock().await.categories.iter().find(|c| &c.slug == slug).cloned())
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.check_category_unique(category)?;
        t.categories.push(category.clone());
        Ok(())
    }

    async fn modify_category(&self, id: Uuid, edit: Edit<Category>) -> Result<Option<Category>> {
        let mut guard = self.tables.lock().await;
        let t = &mut *guard;
        let others = Tables { categories: t.categories.clone(), ..Default::default() };
        modify_in(&mut t.categories, |c| c.id == id, edit, |c| others.check_category_unique(c))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.categories.len();
        t.categories.retain(|c| c.id != id);
        Ok(t.categories.len() != before)
    }
}

#[async_trait]
impl CouponRepository for MemoryStorage {
    async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let t = self.tables.lock().await;
        let mut coupons: Vec<Coupon> = t.coupons.iter().rev().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn find_coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        Ok(self.tables.lock().await.coupons.iter().find(|c| &c.code == code).cloned())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.check_coupon_unique(coupon)?;
        t.coupons.push(coupon.clone());
        Ok(())
    }

    async fn modify_coupon(&self, id: Uuid, edit: Edit<Coupon>) -> Result<Option<Coupon>> {
        let mut guard = self.tables.lock().await;
        let t = &mut *guard;
        let others = Tables { coupons: t.coupons.clone(), ..Default::default() };
        modify_in(&mut t.coupons, |c| c.id == id, edit, |c| others.check_coupon_unique(c))
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.coupons.len();
        t.coupons.retain(|c| c.id != id);
        Ok(t.coupons.len() != before)
    }
}

#[async_trait]
impl OrderRepository for MemoryStorage {
    async fn place_order(&self, checkout: Checkout, shipping: &ShippingPolicy, number_prefix: &str) -> Result<Order> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let products: HashMap<Uuid, Product> = checkout.cart.product_ids().into_iter()
            .filter_map(|id| t.products.iter().find(|p| p.id == id).cloned())
            .map(|p| (p.id, p))
            .collect();
        let coupon = checkout.coupon_code.as_ref().and_then(|code| t.coupons.iter().find(|c| &c.code == code)).cloned();

        let draft = OrderDraft::assemble(checkout, &products, coupon.as_ref(), shipping, now)?;

        // Stage every mutation on copies; the tables are only touched once nothing can fail.
        let mut staged = Vec::with_capacity(products.len());
        for (product_id, qty) in draft.reservations() {
            let mut product = products.get(&product_id).cloned().ok_or(ShopError::NotFound("Product"))?;
            product.remove_inventory(qty).map_err(|_| OrderError::InsufficientStock {
                product: product.name.clone(), requested: qty.value(), available: product.stock,
            })?;
            staged.push(product);
        }
        let redeemed = match coupon {
            Some(mut c) if draft.coupon_code().is_some() => { c.redeem(now).map_err(OrderError::from)?; Some(c) }
            _ => None,
        };

        let order = draft.into_order(format_order_number(number_prefix, t.next_order_sequence()));
        for product in staged {
            if let Some(slot) = t.products.iter_mut().find(|p| p.id == product.id) { *slot = product; }
        }
        if let Some(coupon) = redeemed {
            if let Some(slot) = t.coupons.iter_mut().find(|c| c.id == coupon.id) { *slot = coupon; }
        }
        let mut stored = order.clone();
        stored.take_events();
        t.orders.push(stored);
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, u64)> {
        let t = self.tables.lock().await;
        let mut hits: Vec<Order> = t.orders.iter().rev()
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id == u))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = hits.len() as u64;
        Ok((page_of(&hits, page), total))
    }

    async fn modify_order(&self, id: Uuid, edit: Edit<Order>) -> Result<Option<Order>> {
        let mut t = self.tables.lock().await;
        let Some(slot) = t.orders.iter_mut().find(|o| o.id == id) else { return Ok(None) };
        let mut copy = slot.clone();
        edit(&mut copy)?;
        let edited = copy.clone();
        // Stored rows never carry pending events.
        copy.take_events();
        *slot = copy;
        Ok(Some(edited))
    }

    async fn order_stats(&self, recent: u32) -> Result<OrderStats> {
        let t = self.tables.lock().await;
        let by_status = OrderStatus::ALL.iter()
            .map(|s| (*s, t.orders.iter().filter(|o| o.status == *s).count() as u64))
            .filter(|(_, n)| *n > 0)
            .collect();
        let mut newest: Vec<Order> = t.orders.iter().rev().cloned().collect();
        newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        newest.truncate(recent as usize);
        Ok(OrderStats {
            total_orders: t.orders.len() as u64,
            total_revenue: t.orders.iter().filter(|o| o.is_paid).map(|o| o.total).sum(),
            by_status,
            recent: newest,
        })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<()> { Ok(()) }
}
