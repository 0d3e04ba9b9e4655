//! Aggregates module
pub mod product;
pub mod category;
pub mod coupon;
pub mod order;
pub mod cart;

pub use product::{Product, ProductDraft, ProductError, ProductImage};
pub use category::{Category, CategoryDraft};
pub use coupon::{AppliedCoupon, Coupon, CouponDraft, CouponError, CouponType};
pub use order::{
    format_order_number, Checkout, LineItem, Order, OrderDraft, OrderError, OrderStatus, OrderUpdate, PaymentMethod,
    PaymentResult, ShippingAddress, ShippingPolicy, TransitionError,
};
pub use cart::{Cart, CartLine};
