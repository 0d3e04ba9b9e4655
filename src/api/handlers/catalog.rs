//! Products and categories.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::{parse_id, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{Category, CategoryDraft, Product, ProductDraft, ProductImage};
use crate::domain::value_objects::Sku;
use crate::services::catalog::{CatalogPage, CatalogQuery, CategorySummary, ProductDetail};
use crate::Result;

fn active_by_default() -> bool { true }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,
    #[validate(range(min = 0, message = "Compare price cannot be negative"))]
    pub compare_price: Option<i64>,
    #[serde(alias = "category")]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i64,
    pub sku: Option<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

impl ProductRequest {
    fn into_draft(self) -> Result<ProductDraft> {
        let sku = self.sku.filter(|s| !s.trim().is_empty()).map(Sku::new).transpose()?;
        Ok(ProductDraft {
            name: self.name.trim().to_string(), description: self.description, price: self.price,
            compare_price: self.compare_price, category_id: self.category_id, stock: self.stock, sku,
            images: self.images, tags: self.tags, is_featured: self.is_featured, is_active: self.is_active,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub order: i32,
}

impl From<CategoryRequest> for CategoryDraft {
    fn from(r: CategoryRequest) -> Self {
        CategoryDraft { name: r.name.trim().to_string(), description: r.description, icon: r.icon, is_active: r.is_active, order: r.order }
    }
}

#[derive(Serialize)]
pub struct ProductBody { product: Product }

#[derive(Serialize)]
pub struct CategoryBody { category: Category }

#[derive(Serialize)]
pub struct CategoriesBody { categories: Vec<CategorySummary> }

pub async fn list_products(State(state): State<AppState>, Query(query): Query<CatalogQuery>) -> Result<Json<CatalogPage>> {
    Ok(Json(state.catalog.list_products(&query).await?))
}

pub async fn get_product(State(state): State<AppState>, Path(id_or_slug): Path<String>) -> Result<Json<ProductDetail>> {
    Ok(Json(state.catalog.product_detail(&id_or_slug).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<ProductBody>)> {
    let product = state.catalog.create_product(req.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(ProductBody { product })))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<Json<ProductBody>> {
    let product = state.catalog.update_product(parse_id(&id)?, req.into_draft()?).await?;
    Ok(Json(ProductBody { product }))
}

pub async fn delete_product(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.catalog.delete_product(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoriesBody>> {
    Ok(Json(CategoriesBody { categories: state.catalog.list_categories().await? }))
}

pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryBody>)> {
    let category = state.catalog.create_category(req.into()).await?;
    Ok((StatusCode::CREATED, Json(CategoryBody { category })))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<CategoryRequest>,
) -> Result<Json<CategoryBody>> {
    let category = state.catalog.update_category(parse_id(&id)?, req.into()).await?;
    Ok(Json(CategoryBody { category }))
}

pub async fn delete_category(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.catalog.delete_category(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
