//! HTTP surface.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
mod routes;

use std::sync::Arc;

pub use routes::router;

use crate::config::Config;
use crate::services::payments::WebhookVerifier;
use crate::services::{
    CatalogService, CouponService, EventPublisher, IdentityProvider, JwtIdentity, OrderService, PaymentGateway, PaymentService,
};
use crate::store::Storage;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub identity: Arc<dyn IdentityProvider>,
    pub catalog: Arc<CatalogService>,
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppState {
    /// Wires every service over one storage backend.
    pub fn new(
        config: &Config,
        store: Arc<dyn Storage>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let verifier = WebhookVerifier::new(config.stripe_webhook_secret.clone(), config.webhook_tolerance_secs);
        Self {
            identity: Arc::new(JwtIdentity::new(config.jwt_secret_bytes())),
            catalog: Arc::new(CatalogService::new(store.clone())),
            coupons: Arc::new(CouponService::new(store.clone())),
            orders: Arc::new(OrderService::new(store.clone(), publisher, config.shipping, config.order_number_prefix.clone())),
            payments: Arc::new(PaymentService::new(gateway, config.currency.clone(), verifier)),
            store,
        }
    }
}
