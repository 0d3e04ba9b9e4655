//! Catalog queries and catalog administration.
//!
//! Listing input arrives as raw query strings. Anything malformed falls back
//! to its default, so a listing request never fails on bad filter input.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Category, CategoryDraft, Product, ProductDraft};
use crate::domain::value_objects::Slug;
use crate::store::{PageRequest, ProductFilter, ProductSort, Storage};
use crate::{Result, ShopError};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const RELATED_PRODUCTS: u32 = 4;

/// Listing parameters exactly as received
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub featured: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// 1-indexed page number; anything below 1 or non-numeric becomes 1.
pub fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|&p| p >= 1)
        .map_or(1, |p| u32::try_from(p).unwrap_or(u32::MAX))
}

pub fn parse_limit(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|&l| l >= 1)
        .map_or(default, |l| u32::try_from(l).unwrap_or(u32::MAX).min(MAX_PAGE_SIZE))
}

fn parse_price(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok()).filter(|v| v.is_finite())
}

pub fn parse_sort(raw: Option<&str>) -> ProductSort {
    match raw.map(str::trim) {
        Some("price-asc") => ProductSort::PriceAsc,
        Some("price-desc") => ProductSort::PriceDesc,
        Some("popular") => ProductSort::Popular,
        Some("rating") => ProductSort::Rating,
        _ => ProductSort::Newest,
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination { pub page: u32, pub limit: u32, pub total: u64, pub pages: u64 }

impl Pagination {
    pub fn new(page: PageRequest, total: u64) -> Self {
        Self { page: page.page, limit: page.limit, total, pages: total.div_ceil(u64::from(page.limit.max(1))) }
    }
}

/// Name and slug of the category a product points at
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryRef { pub id: Uuid, pub name: String, pub slug: Slug }

impl From<&Category> for CategoryRef {
    fn from(c: &Category) -> Self { Self { id: c.id, name: c.name.clone(), slug: c.slug.clone() } }
}

/// A product with its category resolved. A dangling category renders as `null`.
#[derive(Clone, Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<CategoryRef>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatalogPage { pub products: Vec<ProductView>, pub pagination: Pagination }

#[derive(Clone, Debug, Serialize)]
pub struct ProductDetail { pub product: ProductView, pub related: Vec<ProductView> }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: u64,
}

pub struct CatalogService {
    store: Arc<dyn Storage>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Storage>) -> Self { Self { store } }

    pub async fn list_products(&self, query: &CatalogQuery) -> Result<CatalogPage> {
        let page = PageRequest {
            page: parse_page(query.page.as_deref()),
            limit: parse_limit(query.limit.as_deref(), DEFAULT_PAGE_SIZE),
        };

        let mut filter = ProductFilter {
            active_only: true,
            search: non_blank(query.search.as_deref()),
            // Prices are whole units; round the bounds inwards.
            min_price: parse_price(query.min_price.as_deref()).map(|v| v.ceil() as i64),
            max_price: parse_price(query.max_price.as_deref()).map(|v| v.floor() as i64),
            featured_only: query.featured.as_deref() == Some("true"),
            ..Default::default()
        };
        if let Some(slug) = non_blank(query.category.as_deref()) {
            match self.store.get_category_by_slug(&Slug::parse(&slug)).await? {
                Some(category) => filter.category_id = Some(category.id),
                None => return Ok(CatalogPage { products: vec![], pagination: Pagination::new(page, 0) }),
            }
        }

        let (products, total) = self.store.list_products(&filter, parse_sort(query.sort.as_deref()), page).await?;
        Ok(CatalogPage { products: self.with_categories(products).await?, pagination: Pagination::new(page, total) })
    }

    /// Looks up by id, falling back to slug. Includes up to four related active products.
    pub async fn product_detail(&self, id_or_slug: &str) -> Result<ProductDetail> {
        let product = match Uuid::parse_str(id_or_slug) {
            Ok(id) => self.store.get_product(id).await?,
            Err(_) => self.store.get_product_by_slug(&Slug::parse(id_or_slug)).await?,
        };
        let product = product.ok_or(ShopError::NotFound("Product"))?;
        let related = self.store.related_products(&product, RELATED_PRODUCTS).await?;

        let mut views = self.with_categories(std::iter::once(product).chain(related).collect()).await?;
        let product = views.remove(0);
        Ok(ProductDetail { product, related: views })
    }

    async fn with_categories(&self, products: Vec<Product>) -> Result<Vec<ProductView>> {
        let categories: HashMap<Uuid, CategoryRef> = self.store
            .list_categories(false).await?
            .iter()
            .map(|c| (c.id, CategoryRef::from(c)))
            .collect();
        Ok(products
            .into_iter()
            .map(|product| {
                let category = product.category_id.and_then(|id| categories.get(&id).cloned());
                ProductView { product, category }
            })
            .collect())
    }

    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let product = Product::create(draft)?;
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, draft: ProductDraft) -> Result<Product> {
        self.store
            .modify_product(id, Box::new(move |p: &mut Product| Ok(p.apply(draft)?)))
            .await?
            .ok_or(ShopError::NotFound("Product"))
    }

    pub async fn delete_product(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_product(id).await? { return Err(ShopError::NotFound("Product")); }
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Active categories in display order, each with its active product count.
    pub async fn list_categories(&self) -> Result<Vec<CategorySummary>> {
        let categories = self.store.list_categories(true).await?;
        let mut summaries = Vec::with_capacity(categories.len());
        for category in categories {
            let product_count = self.store.count_active_products(Some(category.id)).await?;
            summaries.push(CategorySummary { category, product_count });
        }
        Ok(summaries)
    }

    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category> {
        let category = Category::create(draft)?;
        self.store.insert_category(&category).await?;
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, draft: CategoryDraft) -> Result<Category> {
        self.store
            .modify_category(id, Box::new(move |c: &mut Category| Ok(c.apply(draft)?)))
            .await?
            .ok_or(ShopError::NotFound("Category"))
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_category(id).await? { return Err(ShopError::NotFound("Category")); }
        Ok(())
    }
}
