//! `ShopError` to HTTP response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::aggregates::{CouponError, OrderError};
use crate::ShopError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl ShopError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShopError::Validation(_) | ShopError::InvalidSignature | ShopError::Transition(_) => StatusCode::BAD_REQUEST,
            ShopError::NotFound(_)
            | ShopError::Coupon(CouponError::NotFound)
            | ShopError::Order(OrderError::ProductNotFound(_))
            | ShopError::Order(OrderError::Coupon(CouponError::NotFound)) => StatusCode::NOT_FOUND,
            ShopError::Order(_) | ShopError::Coupon(_) => StatusCode::BAD_REQUEST,
            ShopError::Unauthorized | ShopError::AdminRequired => StatusCode::UNAUTHORIZED,
            ShopError::Conflict(_) => StatusCode::CONFLICT,
            ShopError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ShopError::Storage(_) | ShopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Server-side details are logged instead.
    fn user_message(&self) -> String {
        match self {
            ShopError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                "A database error occurred".to_string()
            }
            ShopError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            ShopError::Upstream(msg) => {
                tracing::warn!("Payment gateway error: {}", msg);
                self.to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorResponse { error: self.user_message() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderStatus, TransitionError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(ShopError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ShopError::NotFound("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(ShopError::Coupon(CouponError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ShopError::Coupon(CouponError::ExpiredOrInactive).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ShopError::Order(OrderError::EmptyCart).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ShopError::Order(OrderError::AmountTooLarge).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ShopError::Order(OrderError::ProductNotFound("Case".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ShopError::Transition(TransitionError { from: OrderStatus::Delivered, to: OrderStatus::Pending }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ShopError::AdminRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ShopError::Conflict("Coupon code".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ShopError::Upstream("timeout".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ShopError::InvalidSignature.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_hidden() {
        assert_eq!(ShopError::Internal("pool exhausted".into()).user_message(), "An internal error occurred");
    }
}
