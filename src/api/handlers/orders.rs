//! Checkout and order lifecycle.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::{invalid, parse_id, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{Cart, Checkout, Order, OrderStatus, OrderUpdate, PaymentMethod, PaymentResult, ShippingAddress};
use crate::domain::value_objects::{CouponCode, Quantity};
use crate::services::catalog::{parse_limit, parse_page, Pagination};
use crate::services::orders::DEFAULT_ORDER_PAGE_SIZE;
use crate::services::Principal;
use crate::store::PageRequest;
use crate::{Result, ShopError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[serde(alias = "product", alias = "_id")]
    pub product_id: Uuid,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
}

fn default_country() -> String { "Pakistan".to_string() }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(r: ShippingAddressRequest) -> Self {
        ShippingAddress {
            full_name: r.full_name, phone: r.phone, street: r.street, city: r.city, state: r.state, zip_code: r.zip_code,
            country: r.country,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddressRequest,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentResult>,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub discount: i64,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    fn into_checkout(self, user_id: Uuid) -> Result<Checkout> {
        self.shipping_address.validate().map_err(invalid)?;

        let mut cart = Cart::new();
        for item in self.items {
            let quantity = Quantity::new(item.quantity)?;
            cart.add(item.product_id, item.name, quantity);
        }
        let coupon_code = self.coupon_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(CouponCode::new)
            .transpose()?;

        Ok(Checkout {
            user_id, cart, shipping_address: self.shipping_address.into(), payment_method: self.payment_method,
            payment_result: self.payment_result, coupon_code, discount: self.discount, notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
}

#[derive(Serialize)]
pub struct OrderBody { order: Order }

#[derive(Serialize)]
pub struct OrdersBody { orders: Vec<Order>, pagination: Pagination }

pub async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(req): ValidatedJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderBody>)> {
    let order = state.orders.place(req.into_checkout(principal.user_id)?).await?;
    Ok((StatusCode::CREATED, Json(OrderBody { order })))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrdersBody>> {
    let page = PageRequest {
        page: parse_page(query.page.as_deref()),
        limit: parse_limit(query.limit.as_deref(), DEFAULT_ORDER_PAGE_SIZE),
    };
    let status = query.status.as_deref().and_then(|s| s.parse::<OrderStatus>().ok());
    let (orders, pagination) = state.orders.list(&principal, page, status).await?;
    Ok(Json(OrdersBody { orders, pagination }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<OrderBody>> {
    let order = state.orders.get(parse_id(&id)?, &principal).await?;
    Ok(Json(OrderBody { order }))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateOrderRequest>,
) -> Result<Json<OrderBody>> {
    if req.status.is_none() && req.is_paid.is_none() {
        return Err(ShopError::validation("Nothing to update"));
    }
    let order = state.orders.update(parse_id(&id)?, OrderUpdate { status: req.status, is_paid: req.is_paid }).await?;
    Ok(Json(OrderBody { order }))
}
