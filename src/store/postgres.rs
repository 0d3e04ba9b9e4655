//! Postgres storage.
//!
//! Order placement locks the cart's product rows (in id order, so concurrent
//! checkouts cannot deadlock) and the coupon row, prices the order against
//! what it read, then decrements stock with a `stock >= qty` guard, redeems
//! the coupon under its usage limit and draws the order number from a
//! sequence, all inside one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    CategoryRepository, CouponRepository, Edit, OrderFilter, OrderRepository, OrderStats, PageRequest, ProductFilter,
    ProductRepository, ProductSort, Storage,
};
use crate::domain::aggregates::{
    format_order_number, Category, Checkout, Coupon, CouponError, LineItem, Order, OrderDraft, OrderError, PaymentResult,
    Product, ProductImage, ShippingAddress, ShippingPolicy,
};
use crate::domain::value_objects::{CouponCode, Sku, Slug};
use crate::{Result, ShopError};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a unique-key violation to a 409 naming `entity`.
fn conflict(entity: &'static str) -> impl FnOnce(sqlx::Error) -> ShopError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ShopError::Conflict(entity.to_string()),
        _ => ShopError::Storage(e),
    }
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> ShopError {
    ShopError::Internal(format!("stored {} is invalid: {}", what, detail))
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, slug: String, description: String, price: i64, compare_price: Option<i64>,
    category_id: Option<Uuid>, stock: i64, sku: Option<String>, images: Json<Vec<ProductImage>>, tags: Vec<String>,
    is_featured: bool, is_active: bool, rating_average: f64, rating_count: i64, sold: i64,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product> {
        let sku = self.sku.map(Sku::new).transpose().map_err(|e| corrupt("sku", e))?;
        Ok(Product {
            id: self.id, name: self.name, slug: Slug::parse(&self.slug), description: self.description, price: self.price,
            compare_price: self.compare_price, category_id: self.category_id, stock: self.stock, sku, images: self.images.0,
            tags: self.tags, is_featured: self.is_featured, is_active: self.is_active, rating_average: self.rating_average,
            rating_count: self.rating_count, sold: self.sold, created_at: self.created_at, updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid, name: String, slug: String, description: String, icon: String, is_active: bool, display_order: i32,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category {
            id: r.id, name: r.name, slug: Slug::parse(&r.slug), description: r.description, icon: r.icon,
            is_active: r.is_active, order: r.display_order, created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid, code: String, description: String, kind: String, value: Decimal, min_order_amount: i64,
    max_discount: Option<i64>, usage_limit: Option<i64>, used_count: i64, start_date: DateTime<Utc>,
    end_date: DateTime<Utc>, is_active: bool, created_at: DateTime<Utc>,
}

impl CouponRow {
    fn into_coupon(self) -> Result<Coupon> {
        Ok(Coupon {
            id: self.id, code: CouponCode::new(&self.code).map_err(|e| corrupt("coupon code", e))?,
            description: self.description, kind: self.kind.parse().map_err(|e| corrupt("coupon type", e))?,
            value: self.value, min_order_amount: self.min_order_amount, max_discount: self.max_discount,
            usage_limit: self.usage_limit, used_count: self.used_count, start_date: self.start_date,
            end_date: self.end_date, is_active: self.is_active, created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Uuid, order_number: String, items: Json<Vec<LineItem>>, shipping_address: Json<ShippingAddress>,
    payment_method: String, payment_result: Option<Json<PaymentResult>>, subtotal: i64, shipping_cost: i64,
    discount: i64, coupon_code: Option<String>, total: i64, status: String, is_paid: bool,
    paid_at: Option<DateTime<Utc>>, is_delivered: bool, delivered_at: Option<DateTime<Utc>>, notes: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order> {
        let coupon_code = self.coupon_code.as_deref().map(CouponCode::new).transpose().map_err(|e| corrupt("coupon code", e))?;
        Ok(Order::restore(
            self.id, self.user_id, self.order_number, self.items.0, self.shipping_address.0,
            self.payment_method.parse().map_err(|e| corrupt("payment method", e))?,
            self.payment_result.map(|j| j.0),
            (self.subtotal, self.shipping_cost, self.discount, self.total),
            coupon_code,
            self.status.parse().map_err(|e| corrupt("order status", e))?,
            (self.is_paid, self.paid_at), (self.is_delivered, self.delivered_at),
            self.notes, self.created_at, self.updated_at,
        ))
    }
}

// =============================================================================
// Products
// =============================================================================

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if filter.active_only { qb.push(" AND is_active"); }
    if filter.featured_only { qb.push(" AND is_featured"); }
    if let Some(category_id) = filter.category_id { qb.push(" AND category_id = ").push_bind(category_id); }
    if let Some(min) = filter.min_price { qb.push(" AND price >= ").push_bind(min); }
    if let Some(max) = filter.max_price { qb.push(" AND price <= ").push_bind(max); }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone())
            .push(" OR description ILIKE ").push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ").push_bind(pattern)
            .push("))");
    }
}

fn order_by(sort: ProductSort) -> &'static str {
    // uuid v7 ids grow with creation time, so `id` is the natural-order tie-break
    match sort {
        ProductSort::Newest => " ORDER BY created_at DESC, id ASC",
        ProductSort::PriceAsc => " ORDER BY price ASC, id ASC",
        ProductSort::PriceDesc => " ORDER BY price DESC, id ASC",
        ProductSort::Popular => " ORDER BY sold DESC, id ASC",
        ProductSort::Rating => " ORDER BY rating_average DESC, id ASC",
    }
}

fn to_i64(v: u64) -> i64 { i64::try_from(v).unwrap_or(i64::MAX) }

#[async_trait]
impl ProductRepository for PgStorage {
    async fn list_products(&self, filter: &ProductFilter, sort: ProductSort, page: PageRequest) -> Result<(Vec<Product>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_product_filter(&mut select, filter);
        select.push(order_by(sort))
            .push(" LIMIT ").push_bind(i64::from(page.limit))
            .push(" OFFSET ").push_bind(to_i64(page.offset()));
        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let products = rows.into_iter().map(ProductRow::into_product).collect::<Result<Vec<_>>>()?;
        Ok((products, u64::try_from(total).unwrap_or(0)))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(ProductRow::into_product).transpose()
    }

    async fn get_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE slug = $1")
            .bind(slug.as_str()).fetch_optional(&self.pool).await?
            .map(ProductRow::into_product).transpose()
    }

    async fn related_products(&self, product: &Product, limit: u32) -> Result<Vec<Product>> {
        let Some(category_id) = product.category_id else { return Ok(vec![]) };
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products WHERE category_id = $1 AND id <> $2 AND is_active ORDER BY id LIMIT $3")
            .bind(category_id).bind(product.id).bind(i64::from(limit))
            .fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn count_active_products(&self, category_id: Option<Uuid>) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active AND ($1::uuid IS NULL OR category_id = $1)")
            .bind(category_id).fetch_one(&self.pool).await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, slug, description, price, compare_price, category_id, stock, sku, images, tags, \
             is_featured, is_active, rating_average, rating_count, sold, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)")
            .bind(p.id).bind(&p.name).bind(p.slug.as_str()).bind(&p.description).bind(p.price).bind(p.compare_price)
            .bind(p.category_id).bind(p.stock).bind(p.sku.as_ref().map(|s| s.as_str())).bind(Json(&p.images))
            .bind(&p.tags).bind(p.is_featured).bind(p.is_active).bind(p.rating_average).bind(p.rating_count)
            .bind(p.sold).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await.map_err(conflict("Product slug or SKU"))?;
        Ok(())
    }

    async fn modify_product(&self, id: Uuid, edit: Edit<Product>) -> Result<Option<Product>> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *tx).await? else { return Ok(None) };
        let mut p = row.into_product()?;
        edit(&mut p)?;
        // `sold` and ratings are not admin-editable and are never written here.
        sqlx::query(
            "UPDATE products SET name = $2, slug = $3, description = $4, price = $5, compare_price = $6, category_id = $7, \
             stock = $8, sku = $9, images = $10, tags = $11, is_featured = $12, is_active = $13, updated_at = $14 WHERE id = $1")
            .bind(p.id).bind(&p.name).bind(p.slug.as_str()).bind(&p.description).bind(p.price).bind(p.compare_price)
            .bind(p.category_id).bind(p.stock).bind(p.sku.as_ref().map(|s| s.as_str())).bind(Json(&p.images))
            .bind(&p.tags).bind(p.is_featured).bind(p.is_active).bind(p.updated_at)
            .execute(&mut *tx).await.map_err(conflict("Product slug or SKU"))?;
        tx.commit().await?;
        Ok(Some(p))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

// =============================================================================
// Categories
// =============================================================================

#[async_trait]
impl CategoryRepository for PgStorage {
    async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT * FROM categories WHERE is_active OR NOT $1 ORDER BY display_order, id")
            .bind(active_only).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Category::from))
    }

    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE slug = $1")
            .bind(slug.as_str()).fetch_optional(&self.pool).await?;
        Ok(row.map(Category::from))
    }

    async fn insert_category(&self, c: &Category) -> Result<()> {
        sqlx::query(
            "INSERT INTO categories (id, name, slug, description, icon, is_active, display_order, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(c.id).bind(&c.name).bind(c.slug.as_str()).bind(&c.description).bind(&c.icon)
            .bind(c.is_active).bind(c.order).bind(c.created_at)
            .execute(&self.pool).await.map_err(conflict("Category slug"))?;
        Ok(())
    }

    async fn modify_category(&self, id: Uuid, edit: Edit<Category>) -> Result<Option<Category>> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *tx).await? else { return Ok(None) };
        let mut c = Category::from(row);
        edit(&mut c)?;
        sqlx::query(
            "UPDATE categories SET name = $2, slug = $3, description = $4, icon = $5, is_active = $6, display_order = $7 \
             WHERE id = $1")
            .bind(c.id).bind(&c.name).bind(c.slug.as_str()).bind(&c.description).bind(&c.icon)
            .bind(c.is_active).bind(c.order)
            .execute(&mut *tx).await.map_err(conflict("Category slug"))?;
        tx.commit().await?;
        Ok(Some(c))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

// =============================================================================
// Coupons
// =============================================================================

#[async_trait]
impl CouponRepository for PgStorage {
    async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool).await?;
        rows.into_iter().map(CouponRow::into_coupon).collect()
    }

    async fn find_coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code.as_str()).fetch_optional(&self.pool).await?
            .map(CouponRow::into_coupon).transpose()
    }

    async fn insert_coupon(&self, c: &Coupon) -> Result<()> {
        sqlx::query(
            "INSERT INTO coupons (id, code, description, kind, value, min_order_amount, max_discount, usage_limit, \
             used_count, start_date, end_date, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
            .bind(c.id).bind(c.code.as_str()).bind(&c.description).bind(c.kind.as_str()).bind(c.value)
            .bind(c.min_order_amount).bind(c.max_discount).bind(c.usage_limit).bind(c.used_count)
            .bind(c.start_date).bind(c.end_date).bind(c.is_active).bind(c.created_at)
            .execute(&self.pool).await.map_err(conflict("Coupon code"))?;
        Ok(())
    }

    async fn modify_coupon(&self, id: Uuid, edit: Edit<Coupon>) -> Result<Option<Coupon>> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *tx).await? else { return Ok(None) };
        let mut c = row.into_coupon()?;
        edit(&mut c)?;
        sqlx::query(
            "UPDATE coupons SET code = $2, description = $3, kind = $4, value = $5, min_order_amount = $6, \
             max_discount = $7, usage_limit = $8, start_date = $9, end_date = $10, is_active = $11 WHERE id = $1")
            .bind(c.id).bind(c.code.as_str()).bind(&c.description).bind(c.kind.as_str()).bind(c.value)
            .bind(c.min_order_amount).bind(c.max_discount).bind(c.usage_limit)
            .bind(c.start_date).bind(c.end_date).bind(c.is_active)
            .execute(&mut *tx).await.map_err(conflict("Coupon code"))?;
        tx.commit().await?;
        Ok(Some(c))
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

// =============================================================================
// Orders
// =============================================================================

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id { qb.push(" AND user_id = ").push_bind(user_id); }
    if let Some(status) = filter.status { qb.push(" AND status = ").push_bind(status.as_str()); }
}

#[async_trait]
impl OrderRepository for PgStorage {
    async fn place_order(&self, checkout: Checkout, shipping: &ShippingPolicy, number_prefix: &str) -> Result<Order> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(checkout.cart.product_ids()).fetch_all(&mut *tx).await?;
        let products = rows.into_iter()
            .map(|r| r.into_product().map(|p| (p.id, p)))
            .collect::<Result<HashMap<Uuid, Product>>>()?;
        let coupon = match &checkout.coupon_code {
            Some(code) => sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1 FOR UPDATE")
                .bind(code.as_str()).fetch_optional(&mut *tx).await?
                .map(CouponRow::into_coupon).transpose()?,
            None => None,
        };

        let now = Utc::now();
        let draft = OrderDraft::assemble(checkout, &products, coupon.as_ref(), shipping, now)?;

        for (product_id, qty) in draft.reservations() {
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $2, sold = sold + $2, updated_at = $3 WHERE id = $1 AND stock >= $2")
                .bind(product_id).bind(qty.as_i64()).bind(now)
                .execute(&mut *tx).await?;
            if reserved.rows_affected() == 0 {
                let product = products.get(&product_id);
                return Err(OrderError::InsufficientStock {
                    product: product.map(|p| p.name.clone()).unwrap_or_default(),
                    requested: qty.value(),
                    available: product.map_or(0, |p| p.stock),
                }.into());
            }
        }

        if let Some(code) = draft.coupon_code() {
            let redeemed = sqlx::query(
                "UPDATE coupons SET used_count = used_count + 1 WHERE code = $1 AND is_active \
                 AND $2 BETWEEN start_date AND end_date AND (usage_limit IS NULL OR used_count < usage_limit)")
                .bind(code.as_str()).bind(now)
                .execute(&mut *tx).await?;
            if redeemed.rows_affected() == 0 { return Err(OrderError::Coupon(CouponError::ExpiredOrInactive).into()); }
        }

        let sequence: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')").fetch_one(&mut *tx).await?;
        let order = draft.into_order(format_order_number(number_prefix, sequence));

        sqlx::query(
            "INSERT INTO orders (id, user_id, order_number, items, shipping_address, payment_method, payment_result, \
             subtotal, shipping_cost, discount, coupon_code, total, status, is_paid, paid_at, is_delivered, delivered_at, \
             notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)")
            .bind(order.id).bind(order.user_id).bind(&order.order_number).bind(Json(&order.items))
            .bind(Json(&order.shipping_address)).bind(order.payment_method.as_str())
            .bind(order.payment_result.as_ref().map(Json)).bind(order.subtotal).bind(order.shipping_cost)
            .bind(order.discount).bind(order.coupon_code.as_ref().map(|c| c.as_str())).bind(order.total)
            .bind(order.status.as_str()).bind(order.is_paid).bind(order.paid_at).bind(order.is_delivered)
            .bind(order.delivered_at).bind(&order.notes).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(OrderRow::into_order).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM orders");
        push_order_filter(&mut select, filter);
        select.push(" ORDER BY created_at DESC, id DESC")
            .push(" LIMIT ").push_bind(i64::from(page.limit))
            .push(" OFFSET ").push_bind(to_i64(page.offset()));
        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let orders = rows.into_iter().map(OrderRow::into_order).collect::<Result<Vec<_>>>()?;
        Ok((orders, u64::try_from(total).unwrap_or(0)))
    }

    async fn modify_order(&self, id: Uuid, edit: Edit<Order>) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *tx).await? else { return Ok(None) };
        let mut order = row.into_order()?;
        edit(&mut order)?;
        sqlx::query(
            "UPDATE orders SET status = $2, is_paid = $3, paid_at = $4, is_delivered = $5, delivered_at = $6, \
             payment_result = $7, updated_at = $8 WHERE id = $1")
            .bind(order.id).bind(order.status.as_str()).bind(order.is_paid).bind(order.paid_at)
            .bind(order.is_delivered).bind(order.delivered_at).bind(order.payment_result.as_ref().map(Json))
            .bind(order.updated_at)
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(Some(order))
    }

    async fn order_stats(&self, recent: u32) -> Result<OrderStats> {
        let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        let total_revenue: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE is_paid")
            .fetch_one(&self.pool).await?;
        let grouped: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status")
            .fetch_all(&self.pool).await?;
        let by_status = grouped.into_iter()
            .map(|(s, n)| Ok((s.parse().map_err(|e| corrupt("order status", e))?, u64::try_from(n).unwrap_or(0))))
            .collect::<Result<Vec<_>>>()?;
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC, id DESC LIMIT $1")
            .bind(i64::from(recent)).fetch_all(&self.pool).await?;
        Ok(OrderStats {
            total_orders: u64::try_from(total_orders).unwrap_or(0),
            total_revenue,
            by_status,
            recent: rows.into_iter().map(OrderRow::into_order).collect::<Result<Vec<_>>>()?,
        })
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
