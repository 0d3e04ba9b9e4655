//! Domain event publication.

use async_trait::async_trait;

use crate::domain::events::DomainEvent;
use crate::{Result, ShopError};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<()>;
}

/// Publishes each event as JSON on its `store.orders.*` subject.
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_vec(event).map_err(|e| ShopError::Internal(e.to_string()))?;
        self.client
            .publish(event.subject(), payload.into())
            .await
            .map_err(|e| ShopError::Internal(format!("event bus: {}", e)))
    }
}

/// Used when no bus is configured.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        tracing::debug!(subject = %event.subject(), ?event, "domain event");
        Ok(())
    }
}

/// Publishes in order. A failed publication is logged and never surfaces to the caller.
pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in events {
        if let Err(e) = publisher.publish(&event).await {
            tracing::warn!(subject = %event.subject(), error = %e, "failed to publish domain event");
        }
    }
}
