//! Service configuration loaded from the environment (and `.env`).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::bail;

use crate::domain::aggregates::ShippingPolicy;

pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 5000;
pub const DEFAULT_SHIPPING_FEE: i64 = 200;
pub const DEFAULT_ORDER_NUMBER_PREFIX: &str = "WSCF-";
pub const DEFAULT_CURRENCY: &str = "pkr";
pub const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
const DEV_JWT_SECRET: &str = "dev-secret-key-minimum-32-chars!!";

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    jwt_secret: String,
    pub shipping: ShippingPolicy,
    pub order_number_prefix: String,
    pub currency: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub payment_timeout: Duration,
    pub webhook_tolerance_secs: i64,
    pub nats_url: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("max_connections", &self.max_connections)
            .field("jwt_secret", &"[REDACTED]")
            .field("shipping", &self.shipping)
            .field("order_number_prefix", &self.order_number_prefix)
            .field("currency", &self.currency)
            .field("stripe_secret_key", &self.stripe_secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("stripe_webhook_secret", &self.stripe_webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .field("payment_timeout", &self.payment_timeout)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("nats_url", &self.nats_url)
            .finish()
    }
}

impl Config {
    /// Reads every setting from the environment. Only a missing or short `JWT_SECRET` in a release build is fatal.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if cfg!(debug_assertions) => {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                DEV_JWT_SECRET.to_string()
            }
            Err(_) => bail!("JWT_SECRET environment variable must be set"),
        };
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LENGTH);
        }

        Ok(Self {
            port: parsed("PORT", DEFAULT_PORT),
            database_url: optional("DATABASE_URL"),
            max_connections: parsed("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            jwt_secret,
            shipping: ShippingPolicy {
                free_threshold: parsed("FREE_SHIPPING_THRESHOLD", DEFAULT_FREE_SHIPPING_THRESHOLD),
                flat_fee: parsed("SHIPPING_FEE", DEFAULT_SHIPPING_FEE),
            },
            order_number_prefix: optional("ORDER_NUMBER_PREFIX").unwrap_or_else(|| DEFAULT_ORDER_NUMBER_PREFIX.to_string()),
            currency: optional("CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()).to_lowercase(),
            stripe_secret_key: optional("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            payment_timeout: Duration::from_secs(parsed("PAYMENT_TIMEOUT_SECS", DEFAULT_PAYMENT_TIMEOUT_SECS)),
            webhook_tolerance_secs: parsed("WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS),
            nats_url: optional("NATS_URL"),
        })
    }

    /// Test and embedding configuration: in-memory store, no gateway, given secrets.
    pub fn for_secrets(jwt_secret: impl Into<String>, webhook_secret: Option<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            jwt_secret: jwt_secret.into(),
            shipping: ShippingPolicy::default(),
            order_number_prefix: DEFAULT_ORDER_NUMBER_PREFIX.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            stripe_secret_key: None,
            stripe_webhook_secret: webhook_secret,
            payment_timeout: Duration::from_secs(DEFAULT_PAYMENT_TIMEOUT_SECS),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            nats_url: None,
        }
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] { self.jwt_secret.as_bytes() }

    pub fn server_addr(&self) -> String { format!("0.0.0.0:{}", self.port) }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match optional(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "invalid numeric setting, using default");
            default
        }),
    }
}
