//! Payment intents and the gateway webhook.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::api::extractors::{parse_id, ValidatedJson};
use crate::api::AppState;
use crate::services::payments::SIGNATURE_HEADER;
use crate::services::PaymentIntent;
use crate::{Result, ShopError};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub amount: f64,
    pub order_id: Option<String>,
}

pub async fn create_intent(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateIntentRequest>,
) -> Result<Json<PaymentIntent>> {
    let order_id = req.order_id.as_deref().filter(|id| !id.is_empty()).map(parse_id).transpose()?;
    Ok(Json(state.payments.create_intent(req.amount, order_id).await?))
}

/// Unauthenticated: trust comes from the signature alone. Nothing is read or written before it checks out.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = match state.payments.verify_webhook(signature, &body, Utc::now().timestamp()) {
        Ok(event) => event,
        Err(ShopError::InvalidSignature) => {
            tracing::warn!("webhook signature verification failed");
            return Err(ShopError::InvalidSignature);
        }
        Err(e) => return Err(e),
    };
    state.orders.apply_gateway_event(event).await?;
    Ok(Json(json!({ "received": true })))
}
