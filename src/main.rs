//! WSCF Store - storefront and admin backend

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wscf_store::services::{EventPublisher, LogPublisher, NatsPublisher, PaymentGateway, StripeGateway};
use wscf_store::store::{MemoryStorage, PgStorage, Storage};
use wscf_store::{router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let store: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            let pg = PgStorage::connect(url, config.max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders and catalog live in memory only");
            Arc::new(MemoryStorage::new())
        }
    };

    let gateway: Option<Arc<dyn PaymentGateway>> = match &config.stripe_secret_key {
        Some(key) => Some(Arc::new(StripeGateway::new(key.clone(), config.payment_timeout)?)),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, payment intents are unavailable");
            None
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let app = router(AppState::new(&config, store, gateway, publisher));

    let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
    tracing::info!("🚀 WSCF Store listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
