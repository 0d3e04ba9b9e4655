//! Coupon application and coupon admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::api::extractors::{parse_id, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{Coupon, CouponDraft, CouponType};
use crate::domain::value_objects::CouponCode;
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, message = "Please provide a coupon code"))]
    pub code: String,
    #[validate(range(min = 0, message = "Subtotal cannot be negative"))]
    pub subtotal: i64,
}

#[derive(Debug, Serialize)]
pub struct CouponSummary {
    pub code: CouponCode,
    #[serde(rename = "type")]
    pub kind: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ApplyCouponResponse {
    pub coupon: CouponSummary,
    pub discount: i64,
}

fn active_by_default() -> bool { true }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    #[validate(length(min = 1, max = 50, message = "Coupon code is required"))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(default)]
    pub min_order_amount: i64,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

impl CouponRequest {
    fn into_draft(self) -> Result<CouponDraft> {
        Ok(CouponDraft {
            code: CouponCode::new(&self.code)?, description: self.description, kind: self.kind, value: self.value,
            min_order_amount: self.min_order_amount, max_discount: self.max_discount, usage_limit: self.usage_limit,
            start_date: self.start_date.unwrap_or_else(Utc::now), end_date: self.end_date, is_active: self.is_active,
        })
    }
}

#[derive(Serialize)]
pub struct CouponBody { coupon: Coupon }

#[derive(Serialize)]
pub struct CouponsBody { coupons: Vec<Coupon> }

pub async fn apply_coupon(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ApplyCouponRequest>,
) -> Result<Json<ApplyCouponResponse>> {
    let applied = state.coupons.evaluate(&req.code, req.subtotal).await?;
    Ok(Json(ApplyCouponResponse {
        coupon: CouponSummary { code: applied.code, kind: applied.kind, value: applied.value },
        discount: applied.discount,
    }))
}

pub async fn list_coupons(State(state): State<AppState>) -> Result<Json<CouponsBody>> {
    Ok(Json(CouponsBody { coupons: state.coupons.list().await? }))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CouponRequest>,
) -> Result<(StatusCode, Json<CouponBody>)> {
    let coupon = state.coupons.create(req.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(CouponBody { coupon })))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<CouponRequest>,
) -> Result<Json<CouponBody>> {
    let coupon = state.coupons.update(parse_id(&id)?, req.into_draft()?).await?;
    Ok(Json(CouponBody { coupon }))
}

pub async fn delete_coupon(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.coupons.delete(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Coupon deleted successfully" })))
}
