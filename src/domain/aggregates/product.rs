//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Quantity, Sku, Slug};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: i64,
    pub compare_price: Option<i64>,
    pub category_id: Option<Uuid>,
    pub stock: i64,
    pub sku: Option<Sku>,
    pub images: Vec<ProductImage>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub rating_average: f64,
    pub rating_count: i64,
    pub sold: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage { pub url: String, #[serde(default)] pub alt: String }

/// Fields an admin may set when creating or editing a product. `sold` is deliberately absent.
#[derive(Clone, Debug, Default)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub compare_price: Option<i64>,
    pub category_id: Option<Uuid>,
    pub stock: i64,
    pub sku: Option<Sku>,
    pub images: Vec<ProductImage>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
}

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, ProductError> {
        draft.check()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), slug: Slug::from_name(&draft.name).map_err(|_| ProductError::MissingName)?,
            name: draft.name, description: draft.description, price: draft.price, compare_price: draft.compare_price,
            category_id: draft.category_id, stock: draft.stock, sku: draft.sku, images: draft.images, tags: draft.tags,
            is_featured: draft.is_featured, is_active: draft.is_active, rating_average: 0.0, rating_count: 0, sold: 0,
            created_at: now, updated_at: now,
        })
    }

    /// Replaces the editable fields. Slug follows the name; `sold` and ratings are untouched.
    pub fn apply(&mut self, draft: ProductDraft) -> Result<(), ProductError> {
        draft.check()?;
        self.slug = Slug::from_name(&draft.name).map_err(|_| ProductError::MissingName)?;
        self.name = draft.name;
        self.description = draft.description;
        self.price = draft.price;
        self.compare_price = draft.compare_price;
        self.category_id = draft.category_id;
        self.stock = draft.stock;
        self.sku = draft.sku;
        self.images = draft.images;
        self.tags = draft.tags;
        self.is_featured = draft.is_featured;
        self.is_active = draft.is_active;
        self.touch();
        Ok(())
    }

    pub fn first_image_url(&self) -> String { self.images.first().map(|i| i.url.clone()).unwrap_or_default() }
    pub fn has_stock_for(&self, qty: Quantity) -> bool { self.stock >= qty.as_i64() }

    /// Moves `qty` units from stock to sold.
    pub fn remove_inventory(&mut self, qty: Quantity) -> Result<(), ProductError> {
        if !self.has_stock_for(qty) { return Err(ProductError::InsufficientInventory); }
        self.stock -= qty.as_i64();
        self.sold += qty.as_i64();
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl ProductDraft {
    fn check(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.price < 0 || self.compare_price.is_some_and(|p| p < 0) { return Err(ProductError::NegativePrice); }
        if self.stock < 0 { return Err(ProductError::NegativeStock); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("Product name is required")]
    MissingName,
    #[error("Price cannot be negative")]
    NegativePrice,
    #[error("Stock cannot be negative")]
    NegativeStock,
    #[error("Insufficient inventory")]
    InsufficientInventory,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft { name: "Braided Cable".into(), price: 1000, stock: 5, is_active: true, ..Default::default() }
    }

    #[test]
    fn test_product_create() {
        let p = Product::create(draft()).unwrap();
        assert_eq!(p.slug.as_str(), "braided-cable");
        assert_eq!(p.sold, 0);
    }

    #[test]
    fn test_product_rejects_negative_stock() {
        let err = Product::create(ProductDraft { stock: -1, ..draft() }).unwrap_err();
        assert_eq!(err, ProductError::NegativeStock);
    }

    #[test]
    fn test_inventory() {
        let mut p = Product::create(draft()).unwrap();
        p.remove_inventory(Quantity::new(3).unwrap()).unwrap();
        assert_eq!((p.stock, p.sold), (2, 3));
        assert_eq!(p.remove_inventory(Quantity::new(3).unwrap()), Err(ProductError::InsufficientInventory));
        assert_eq!((p.stock, p.sold), (2, 3));
    }

    #[test]
    fn test_apply_keeps_sold() {
        let mut p = Product::create(draft()).unwrap();
        p.remove_inventory(Quantity::new(2).unwrap()).unwrap();
        p.apply(ProductDraft { name: "Braided Cable 2m".into(), stock: 10, ..draft() }).unwrap();
        assert_eq!(p.slug.as_str(), "braided-cable-2m");
        assert_eq!((p.stock, p.sold), (10, 2));
    }
}
