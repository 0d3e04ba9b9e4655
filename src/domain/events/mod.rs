//! Domain events
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, user_id: Uuid, total: i64 },
    Paid { order_id: Uuid, payment_id: Option<String> },
    PaymentFailed { order_id: Uuid, payment_id: String },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// Bus subject, e.g. `store.orders.created`
    pub fn subject(&self) -> String {
        match self {
            DomainEvent::Order(e) => {
                let name = match e {
                    OrderEvent::Created { .. } => "created",
                    OrderEvent::Paid { .. } => "paid",
                    OrderEvent::PaymentFailed { .. } => "payment_failed",
                    OrderEvent::StatusChanged { .. } => "status_changed",
                };
                format!("store.orders.{}", name)
            }
        }
    }
}
