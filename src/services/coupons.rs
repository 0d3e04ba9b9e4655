//! Coupon evaluation and coupon administration.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::aggregates::{AppliedCoupon, Coupon, CouponDraft, CouponError};
use crate::domain::value_objects::CouponCode;
use crate::store::Storage;
use crate::{Result, ShopError};

pub struct CouponService {
    store: Arc<dyn Storage>,
}

impl CouponService {
    pub fn new(store: Arc<dyn Storage>) -> Self { Self { store } }

    /// Prices `code` against `subtotal` right now. Read-only: usage is only counted when an order commits.
    pub async fn evaluate(&self, code: &str, subtotal: i64) -> Result<AppliedCoupon> {
        let code = CouponCode::new(code).map_err(|_| CouponError::NotFound)?;
        let coupon = self.store.find_coupon_by_code(&code).await?.ok_or(CouponError::NotFound)?;
        Ok(coupon.evaluate(subtotal, Utc::now())?)
    }

    pub async fn list(&self) -> Result<Vec<Coupon>> { self.store.list_coupons().await }

    pub async fn create(&self, draft: CouponDraft) -> Result<Coupon> {
        let coupon = Coupon::create(draft)?;
        self.store.insert_coupon(&coupon).await?;
        tracing::info!(code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    pub async fn update(&self, id: Uuid, draft: CouponDraft) -> Result<Coupon> {
        self.store
            .modify_coupon(id, Box::new(move |c: &mut Coupon| Ok(c.apply(draft)?)))
            .await?
            .ok_or(ShopError::NotFound("Coupon"))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_coupon(id).await? { return Err(ShopError::NotFound("Coupon")); }
        Ok(())
    }
}
