//! Value Objects for the store

use serde::{Deserialize, Serialize};
use std::fmt;

/// URL slug derived from a display name
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Lowercases the name and collapses every run of non-alphanumerics into a single `-`.
    pub fn from_name(name: &str) -> Result<Self, ValueError> {
        let mut slug = String::with_capacity(name.len());
        for c in name.trim().chars().flat_map(char::to_lowercase) {
            if c.is_ascii_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-').to_string();
        if slug.is_empty() { return Err(ValueError::EmptySlug); }
        Ok(Self(slug))
    }
    pub fn parse(value: &str) -> Self { Self(value.trim().to_lowercase()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(ValueError::EmptySku); }
        if value.len() > 50 { return Err(ValueError::SkuTooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Coupon code, always trimmed and upper-cased so lookups are exact matches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: &str) -> Result<Self, ValueError> {
        let value = value.trim().to_uppercase();
        if value.is_empty() { return Err(ValueError::EmptyCouponCode); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Strictly positive line quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, ValueError> {
        if value == 0 { return Err(ValueError::ZeroQuantity); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
    pub fn as_i64(&self) -> i64 { i64::from(self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Name must contain at least one letter or digit")]
    EmptySlug,
    #[error("SKU cannot be empty")]
    EmptySku,
    #[error("SKU cannot exceed 50 characters")]
    SkuTooLong,
    #[error("Coupon code cannot be empty")]
    EmptyCouponCode,
    #[error("Quantity must be at least 1")]
    ZeroQuantity,
}
