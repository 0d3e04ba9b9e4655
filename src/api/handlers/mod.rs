pub mod admin;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod payments;
