//! Coupon Aggregate
//!
//! A coupon is usable at instant `now` iff it is active, `now` lies inside
//! `[start_date, end_date]` and the usage limit (if any) has not been reached.
//! Evaluation is a pure function of the coupon, the subtotal and `now`;
//! only [`Coupon::redeem`] moves `used_count`.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub min_order_amount: i64,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponType { Percentage, Fixed }

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl std::str::FromStr for CouponType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "percentage" => Ok(Self::Percentage), "fixed" => Ok(Self::Fixed), other => Err(format!("unknown coupon type '{}'", other)) }
    }
}

#[derive(Clone, Debug)]
pub struct CouponDraft {
    pub code: CouponCode,
    pub description: String,
    pub kind: CouponType,
    pub value: Decimal,
    pub min_order_amount: i64,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

/// Result of a successful evaluation
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedCoupon { pub code: CouponCode, pub kind: CouponType, pub value: Decimal, pub discount: i64 }

impl Coupon {
    pub fn create(draft: CouponDraft) -> Result<Self, CouponError> {
        draft.check()?;
        Ok(Self {
            id: Uuid::now_v7(), code: draft.code, description: draft.description, kind: draft.kind, value: draft.value,
            min_order_amount: draft.min_order_amount, max_discount: draft.max_discount, usage_limit: draft.usage_limit,
            used_count: 0, start_date: draft.start_date, end_date: draft.end_date, is_active: draft.is_active, created_at: Utc::now(),
        })
    }

    pub fn apply(&mut self, draft: CouponDraft) -> Result<(), CouponError> {
        draft.check()?;
        self.code = draft.code;
        self.description = draft.description;
        self.kind = draft.kind;
        self.value = draft.value;
        self.min_order_amount = draft.min_order_amount;
        self.max_discount = draft.max_discount;
        self.usage_limit = draft.usage_limit;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
        self.is_active = draft.is_active;
        Ok(())
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && now >= self.start_date
            && now <= self.end_date
            && self.usage_limit.map_or(true, |limit| self.used_count < limit)
    }

    pub fn evaluate(&self, subtotal: i64, now: DateTime<Utc>) -> Result<AppliedCoupon, CouponError> {
        if !self.is_valid(now) { return Err(CouponError::ExpiredOrInactive); }
        if subtotal < self.min_order_amount { return Err(CouponError::MinimumOrderNotMet { minimum: self.min_order_amount }); }
        let discount = match self.kind {
            CouponType::Percentage => {
                let raw = round_half_up(Decimal::from(subtotal) * self.value / Decimal::ONE_HUNDRED);
                self.max_discount.map_or(raw, |cap| raw.min(cap))
            }
            // Not clamped to the subtotal here; order assembly caps what it applies.
            CouponType::Fixed => round_half_up(self.value),
        };
        Ok(AppliedCoupon { code: self.code.clone(), kind: self.kind, value: self.value, discount })
    }

    /// Counts one use. Fails without side effects when the coupon is no longer valid.
    pub fn redeem(&mut self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_valid(now) { return Err(CouponError::ExpiredOrInactive); }
        self.used_count += 1;
        Ok(())
    }
}

fn round_half_up(value: Decimal) -> i64 {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i64().unwrap_or(i64::MAX)
}

impl CouponDraft {
    fn check(&self) -> Result<(), CouponError> {
        if self.value < Decimal::ZERO { return Err(CouponError::Invalid("Value cannot be negative")); }
        if self.kind == CouponType::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err(CouponError::Invalid("Percentage cannot exceed 100"));
        }
        if self.min_order_amount < 0 || self.max_discount.is_some_and(|m| m < 0) || self.usage_limit.is_some_and(|l| l < 0) {
            return Err(CouponError::Invalid("Amounts and limits cannot be negative"));
        }
        if self.end_date < self.start_date { return Err(CouponError::Invalid("End date must not precede start date")); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("Invalid coupon code")]
    NotFound,
    #[error("This coupon has expired or is no longer valid")]
    ExpiredOrInactive,
    #[error("Minimum order amount is {minimum}")]
    MinimumOrderNotMet { minimum: i64 },
    #[error("{0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(kind: CouponType, value: i64) -> Coupon {
        let now = Utc::now();
        Coupon::create(CouponDraft {
            code: CouponCode::new("welcome10").unwrap(), description: String::new(), kind, value: Decimal::from(value),
            min_order_amount: 0, max_discount: None, usage_limit: None,
            start_date: now - Duration::days(1), end_date: now + Duration::days(30), is_active: true,
        }).unwrap()
    }

    #[test]
    fn test_percentage_discount_rounds_half_up() {
        let c = coupon(CouponType::Percentage, 15);
        // 15% of 1010 = 151.5
        assert_eq!(c.evaluate(1010, Utc::now()).unwrap().discount, 152);
    }

    #[test]
    fn test_percentage_discount_capped() {
        let mut c = coupon(CouponType::Percentage, 10);
        c.max_discount = Some(5000);
        c.min_order_amount = 2000;
        assert_eq!(c.evaluate(6000, Utc::now()).unwrap().discount, 600);
        c.max_discount = Some(300);
        assert_eq!(c.evaluate(6000, Utc::now()).unwrap().discount, 300);
    }

    #[test]
    fn test_fixed_discount_not_clamped() {
        let c = coupon(CouponType::Fixed, 500);
        assert_eq!(c.evaluate(100, Utc::now()).unwrap().discount, 500);
    }

    #[test]
    fn test_minimum_order() {
        let mut c = coupon(CouponType::Fixed, 100);
        c.min_order_amount = 2000;
        assert_eq!(c.evaluate(1999, Utc::now()), Err(CouponError::MinimumOrderNotMet { minimum: 2000 }));
        assert!(c.evaluate(2000, Utc::now()).is_ok());
    }

    #[test]
    fn test_validity_window_and_flags() {
        let mut c = coupon(CouponType::Fixed, 100);
        assert!(!c.is_valid(c.start_date - Duration::seconds(1)));
        assert!(c.is_valid(c.end_date));
        assert!(!c.is_valid(c.end_date + Duration::seconds(1)));
        c.is_active = false;
        assert_eq!(c.evaluate(1000, Utc::now()), Err(CouponError::ExpiredOrInactive));
    }

    #[test]
    fn test_redeem_respects_usage_limit() {
        let mut c = coupon(CouponType::Fixed, 100);
        c.usage_limit = Some(1);
        c.redeem(Utc::now()).unwrap();
        assert_eq!(c.used_count, 1);
        assert_eq!(c.redeem(Utc::now()), Err(CouponError::ExpiredOrInactive));
        assert_eq!(c.used_count, 1);
    }

    #[test]
    fn test_draft_rejects_percentage_over_100() {
        let now = Utc::now();
        let err = Coupon::create(CouponDraft {
            code: CouponCode::new("BIG").unwrap(), description: String::new(), kind: CouponType::Percentage,
            value: Decimal::from(120), min_order_amount: 0, max_discount: None, usage_limit: None,
            start_date: now, end_date: now, is_active: true,
        }).unwrap_err();
        assert!(matches!(err, CouponError::Invalid(_)));
    }
}
