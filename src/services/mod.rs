//! Application services - the use cases behind the HTTP surface.
//!
//! Services depend only on the storage, identity, gateway and event-bus
//! abstractions, never on a concrete backend.

pub mod catalog;
pub mod coupons;
pub mod events;
pub mod identity;
pub mod orders;
pub mod payments;

pub use catalog::{CatalogQuery, CatalogService, Pagination};
pub use coupons::CouponService;
pub use events::{EventPublisher, LogPublisher, NatsPublisher};
pub use identity::{IdentityProvider, JwtIdentity, Principal, Role};
pub use orders::OrderService;
pub use payments::{GatewayEvent, PaymentGateway, PaymentIntent, PaymentService, StripeGateway, WebhookVerifier};
