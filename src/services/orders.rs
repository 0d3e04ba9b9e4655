//! Checkout and the order lifecycle.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Checkout, Order, OrderStatus, OrderUpdate, ShippingPolicy};
use crate::services::catalog::Pagination;
use crate::services::events::{publish_all, EventPublisher};
use crate::services::identity::Principal;
use crate::services::payments::GatewayEvent;
use crate::store::{Edit, OrderFilter, PageRequest, Storage};
use crate::{Result, ShopError};

pub const DEFAULT_ORDER_PAGE_SIZE: u32 = 10;
const RECENT_ORDERS: u32 = 5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals { pub total_orders: u64, pub total_products: u64, pub total_revenue: i64 }

#[derive(Clone, Debug, Serialize)]
pub struct StatusCount { pub status: OrderStatus, pub count: u64 }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub stats: Totals,
    pub recent_orders: Vec<Order>,
    pub orders_by_status: Vec<StatusCount>,
}

pub struct OrderService {
    store: Arc<dyn Storage>,
    publisher: Arc<dyn EventPublisher>,
    shipping: ShippingPolicy,
    number_prefix: String,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Storage>,
        publisher: Arc<dyn EventPublisher>,
        shipping: ShippingPolicy,
        number_prefix: impl Into<String>,
    ) -> Self {
        Self { store, publisher, shipping, number_prefix: number_prefix.into() }
    }

    pub async fn place(&self, checkout: Checkout) -> Result<Order> {
        let user_id = checkout.user_id;
        let mut order = match self.store.place_order(checkout, &self.shipping, &self.number_prefix).await {
            Ok(order) => order,
            Err(e) => {
                tracing::info!(%user_id, error = %e, "checkout rejected");
                return Err(e);
            }
        };
        tracing::info!(order_id = %order.id, order_number = %order.order_number, total = order.total, "order placed");
        publish_all(self.publisher.as_ref(), order.take_events()).await;
        Ok(order)
    }

    /// Owners see their own orders; admins see every order.
    pub async fn get(&self, id: Uuid, principal: &Principal) -> Result<Order> {
        let order = self.store.get_order(id).await?.ok_or(ShopError::NotFound("Order"))?;
        if !principal.is_admin() && !order.is_owned_by(principal.user_id) { return Err(ShopError::Unauthorized); }
        Ok(order)
    }

    /// Newest first. Only admins may filter by status; users are always scoped to their own orders.
    pub async fn list(&self, principal: &Principal, page: PageRequest, status: Option<OrderStatus>) -> Result<(Vec<Order>, Pagination)> {
        let filter = if principal.is_admin() {
            OrderFilter { user_id: None, status }
        } else {
            OrderFilter { user_id: Some(principal.user_id), status: None }
        };
        let (orders, total) = self.store.list_orders(&filter, page).await?;
        Ok((orders, Pagination::new(page, total)))
    }

    /// Admin lifecycle edit.
    pub async fn update(&self, id: Uuid, update: OrderUpdate) -> Result<Order> {
        let now = Utc::now();
        let mut order = self.store
            .modify_order(id, Box::new(move |o: &mut Order| Ok(o.apply_update(update, now)?)))
            .await?
            .ok_or(ShopError::NotFound("Order"))?;
        tracing::info!(order_id = %order.id, order_number = %order.order_number, status = %order.status, is_paid = order.is_paid, "order updated");
        publish_all(self.publisher.as_ref(), order.take_events()).await;
        Ok(order)
    }

    /// Applies a verified gateway event. Events for unknown orders are acknowledged and dropped.
    pub async fn apply_gateway_event(&self, event: GatewayEvent) -> Result<()> {
        let now = Utc::now();
        let (order_id, edit) = match event {
            GatewayEvent::PaymentSucceeded { order_id, payment_id } => {
                let edit: Edit<Order> = Box::new(move |o: &mut Order| { o.confirm_payment(payment_id, now); Ok(()) });
                (order_id, edit)
            }
            GatewayEvent::PaymentFailed { order_id, payment_id } => {
                let edit: Edit<Order> = Box::new(move |o: &mut Order| { o.record_payment_failure(payment_id, now); Ok(()) });
                (order_id, edit)
            }
            GatewayEvent::Ignored { kind } => {
                tracing::debug!(kind = %kind, "ignoring webhook event");
                return Ok(());
            }
        };

        match self.store.modify_order(order_id, edit).await? {
            Some(mut order) => {
                tracing::info!(order_id = %order.id, order_number = %order.order_number, is_paid = order.is_paid, "payment webhook applied");
                publish_all(self.publisher.as_ref(), order.take_events()).await;
            }
            None => tracing::warn!(%order_id, "payment webhook for unknown order"),
        }
        Ok(())
    }

    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let stats = self.store.order_stats(RECENT_ORDERS).await?;
        let total_products = self.store.count_active_products(None).await?;
        Ok(DashboardStats {
            stats: Totals { total_orders: stats.total_orders, total_products, total_revenue: stats.total_revenue },
            recent_orders: stats.recent,
            orders_by_status: stats.by_status.into_iter().map(|(status, count)| StatusCount { status, count }).collect(),
        })
    }
}
