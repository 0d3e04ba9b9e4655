//! Route table.
//!
//! Routes are grouped by who may call them; each group carries its own
//! authorization layers, and groups sharing a path are merged by method.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{admin, catalog, coupons, orders, payments};
use super::middleware::{require_admin, require_auth};
use super::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(admin::health))
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/payment/webhook", post(payments::webhook));

    let customer = Router::new()
        .route("/coupons/apply", post(coupons::apply_coupon))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/payment/create-intent", post(payments::create_intent))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin = Router::new()
        .route("/products", post(catalog::create_product))
        .route("/products/:id", put(catalog::update_product).delete(catalog::delete_product))
        .route("/categories", post(catalog::create_category))
        .route("/categories/:id", put(catalog::update_category).delete(catalog::delete_category))
        .route("/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/coupons/:id", put(coupons::update_coupon).delete(coupons::delete_coupon))
        .route("/orders/:id", put(orders::update_order))
        .route("/admin/stats", get(admin::stats))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
