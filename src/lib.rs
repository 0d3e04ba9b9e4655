//! WSCF Store
//!
//! Storefront and admin backend for a mobile accessories shop.
//!
//! ## Features
//! - Catalog browsing with filters, search, sorting and pagination
//! - Coupon evaluation (percentage and fixed discounts)
//! - Checkout: server-side repricing, atomic stock reservation, sequential order numbers
//! - Order lifecycle driven by admins and signed payment webhooks
//! - Admin console endpoints for products, categories, coupons and orders

pub mod api;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{CouponError, OrderError, ProductError, TransitionError};
use crate::domain::value_objects::ValueError;

pub use api::{router, AppState};
pub use config::Config;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unauthorized: admin access required")]
    AdminRequired,

    #[error("{0} already exists")]
    Conflict(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Payment gateway error: {0}")]
    Upstream(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    pub fn validation(msg: impl Into<String>) -> Self { ShopError::Validation(msg.into()) }
}

impl From<ValueError> for ShopError {
    fn from(e: ValueError) -> Self { ShopError::Validation(e.to_string()) }
}

impl From<ProductError> for ShopError {
    fn from(e: ProductError) -> Self { ShopError::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, ShopError>;
