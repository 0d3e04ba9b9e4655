//! Payment gateway collaborator: payment intents out, signed webhooks in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::{Result, ShopError};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API: &str = "https://api.stripe.com/v1";
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in minor units.
    async fn create_intent(&self, amount: i64, currency: &str, order_id: Option<Uuid>) -> Result<PaymentIntent>;
}

// =============================================================================
// Stripe
// =============================================================================

pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct StripeIntent { id: String, client_secret: String }

#[derive(Deserialize)]
struct StripeErrorBody { error: StripeError }

#[derive(Deserialize)]
struct StripeError { message: String }

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShopError::Internal(format!("http client: {}", e)))?;
        Ok(Self { http, secret_key: secret_key.into(), base_url: STRIPE_API.to_string() })
    }
}

fn upstream(e: reqwest::Error) -> ShopError {
    if e.is_timeout() {
        ShopError::Upstream("payment gateway timed out".into())
    } else {
        ShopError::Upstream(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, amount: i64, currency: &str, order_id: Option<Uuid>) -> Result<PaymentIntent> {
        let mut form = vec![
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        if let Some(order_id) = order_id {
            form.push(("metadata[orderId]", order_id.to_string()));
        }

        let response = self.http
            .post(format!("{}/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(upstream)?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.json::<StripeErrorBody>().await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("gateway responded {}", status));
            return Err(ShopError::Upstream(message));
        }

        let intent: StripeIntent = response.json().await.map_err(upstream)?;
        Ok(PaymentIntent { client_secret: intent.client_secret, payment_intent_id: intent.id })
    }
}

// =============================================================================
// Webhooks
// =============================================================================

/// Checks `t=<unix>,v1=<hex>` signatures: HMAC-SHA256 over `"<t>.<body>"`.
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, tolerance_secs: i64) -> Self { Self { secret, tolerance_secs } }

    pub fn verify(&self, header: Option<&str>, body: &[u8], now: i64) -> Result<()> {
        let Some(secret) = &self.secret else {
            tracing::warn!("webhook received but no signing secret is configured");
            return Err(ShopError::InvalidSignature);
        };
        let header = header.ok_or(ShopError::InvalidSignature)?;

        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
                Some(("v1", v)) => candidates.extend(hex::decode(v).ok()),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(ShopError::InvalidSignature)?;
        if now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() { return Err(ShopError::InvalidSignature); }

        let mac = signed_mac(secret, timestamp, body)?;
        if candidates.iter().any(|sig| mac.clone().verify_slice(sig).is_ok()) {
            Ok(())
        } else {
            Err(ShopError::InvalidSignature)
        }
    }
}

fn signed_mac(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| ShopError::Internal(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Builds a signature header the way the gateway does, for local tooling and tests.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String> {
    let mac = signed_mac(secret, timestamp, body)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// The webhook events this service acts on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentSucceeded { order_id: Uuid, payment_id: String },
    PaymentFailed { order_id: Uuid, payment_id: String },
    Ignored { kind: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData { object: RawIntent }

#[derive(Deserialize)]
struct RawIntent {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl GatewayEvent {
    /// Parses a verified body. Events without a usable `metadata.orderId` are ignored.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(body).map_err(|e| ShopError::validation(format!("Malformed event: {}", e)))?;
        let order_id = raw.data.object.metadata.get("orderId").and_then(|id| Uuid::parse_str(id).ok());
        let payment_id = raw.data.object.id;
        Ok(match (raw.kind.as_str(), order_id) {
            ("payment_intent.succeeded", Some(order_id)) => Self::PaymentSucceeded { order_id, payment_id },
            ("payment_intent.payment_failed", Some(order_id)) => Self::PaymentFailed { order_id, payment_id },
            _ => Self::Ignored { kind: raw.kind.clone() },
        })
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct PaymentService {
    gateway: Option<Arc<dyn PaymentGateway>>,
    currency: String,
    verifier: WebhookVerifier,
}

impl PaymentService {
    pub fn new(gateway: Option<Arc<dyn PaymentGateway>>, currency: impl Into<String>, verifier: WebhookVerifier) -> Self {
        Self { gateway, currency: currency.into(), verifier }
    }

    /// `amount` is in currency units; the gateway is charged in minor units.
    pub async fn create_intent(&self, amount: f64, order_id: Option<Uuid>) -> Result<PaymentIntent> {
        if !amount.is_finite() || amount <= 0.0 { return Err(ShopError::validation("Invalid amount")); }
        let minor = (amount * 100.0).round();
        if minor >= i64::MAX as f64 { return Err(ShopError::validation("Invalid amount")); }
        let minor = minor as i64;
        let gateway = self.gateway.as_ref().ok_or_else(|| ShopError::Upstream("payment gateway is not configured".into()))?;
        gateway.create_intent(minor, &self.currency, order_id).await
    }

    pub fn verify_webhook(&self, signature: Option<&str>, body: &[u8], now: i64) -> Result<GatewayEvent> {
        self.verifier.verify(signature, body, now)?;
        GatewayEvent::parse(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    /// Echoes the decoded form fields back through `client_secret`.
    async fn echo_gateway() -> String {
        use axum::{routing::post, Form, Json, Router};

        async fn create(Form(fields): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
            let field = |k: &str| fields.get(k).cloned().unwrap_or_default();
            let secret = [field("amount"), field("currency"), field("automatic_payment_methods[enabled]"), field("metadata[orderId]")].join("|");
            Json(serde_json::json!({ "id": "pi_echo", "client_secret": secret }))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, Router::new().route("/payment_intents", post(create))).await });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_intent_form_is_url_encoded() {
        let gateway = StripeGateway { base_url: echo_gateway().await, ..StripeGateway::new("sk_test", Duration::from_secs(5)).unwrap() };
        let order_id = Uuid::now_v7();
        let intent = gateway.create_intent(220_000, "pk r&x=1", Some(order_id)).await.unwrap();
        assert_eq!(intent.payment_intent_id, "pi_echo");
        assert_eq!(intent.client_secret, format!("220000|pk r&x=1|true|{}", order_id));
    }

    fn body(kind: &str, order_id: &str) -> Vec<u8> {
        serde_json::json!({
            "type": kind,
            "data": { "object": { "id": "pi_123", "metadata": { "orderId": order_id } } }
        }).to_string().into_bytes()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()), 300);
        let payload = body("payment_intent.succeeded", &Uuid::now_v7().to_string());
        let header = sign_payload(SECRET, 1_700_000_000, &payload).unwrap();
        assert!(verifier.verify(Some(&header), &payload, 1_700_000_010).is_ok());
    }

    #[test]
    fn test_tampered_stale_or_missing_signature_rejected() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()), 300);
        let payload = body("payment_intent.succeeded", &Uuid::now_v7().to_string());
        let header = sign_payload(SECRET, 1_700_000_000, &payload).unwrap();

        let mut tampered = payload.clone();
        tampered.push(b' ');
        assert!(matches!(verifier.verify(Some(&header), &tampered, 1_700_000_000), Err(ShopError::InvalidSignature)));
        assert!(matches!(verifier.verify(Some(&header), &payload, 1_700_000_301), Err(ShopError::InvalidSignature)));
        assert!(matches!(verifier.verify(None, &payload, 1_700_000_000), Err(ShopError::InvalidSignature)));

        let forged = sign_payload("whsec_other", 1_700_000_000, &payload).unwrap();
        assert!(matches!(verifier.verify(Some(&forged), &payload, 1_700_000_000), Err(ShopError::InvalidSignature)));
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        let verifier = WebhookVerifier::new(None, 300);
        let payload = body("payment_intent.succeeded", &Uuid::now_v7().to_string());
        let header = sign_payload(SECRET, 1_700_000_000, &payload).unwrap();
        assert!(verifier.verify(Some(&header), &payload, 1_700_000_000).is_err());
    }

    #[test]
    fn test_parse_events() {
        let order_id = Uuid::now_v7();
        assert_eq!(
            GatewayEvent::parse(&body("payment_intent.succeeded", &order_id.to_string())).unwrap(),
            GatewayEvent::PaymentSucceeded { order_id, payment_id: "pi_123".into() }
        );
        assert_eq!(
            GatewayEvent::parse(&body("payment_intent.payment_failed", &order_id.to_string())).unwrap(),
            GatewayEvent::PaymentFailed { order_id, payment_id: "pi_123".into() }
        );
        assert!(matches!(GatewayEvent::parse(&body("charge.refunded", "x")).unwrap(), GatewayEvent::Ignored { .. }));
        assert!(matches!(GatewayEvent::parse(&body("payment_intent.succeeded", "not-a-uuid")).unwrap(), GatewayEvent::Ignored { .. }));
        assert!(GatewayEvent::parse(b"{").is_err());
    }

    #[tokio::test]
    async fn test_create_intent_validates_amount_and_gateway() {
        let service = PaymentService::new(None, "pkr", WebhookVerifier::new(None, 300));
        assert!(matches!(service.create_intent(0.0, None).await, Err(ShopError::Validation(_))));
        assert!(matches!(service.create_intent(1500.0, None).await, Err(ShopError::Upstream(_))));
    }
}
